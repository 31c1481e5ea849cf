use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::session::{SessionKey, SessionKeyId, WAITING_WALLET};

use super::facts::parse_timestamp;
use super::{RepositoryError, SessionKeyRepository};
use crate::DbPool;

pub struct SqlSessionKeyRepository {
    pool: DbPool,
}

impl SqlSessionKeyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionKeyRepository for SqlSessionKeyRepository {
    async fn save(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO session_keys
                (id, user_id, wallet_address, session_public_key, session_private_key,
                 scope, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                wallet_address = excluded.wallet_address,
                session_public_key = excluded.session_public_key,
                session_private_key = excluded.session_private_key,
                scope = excluded.scope,
                expires_at = excluded.expires_at",
        )
        .bind(&key.id.0)
        .bind(&key.user_id)
        .bind(&key.wallet_address)
        .bind(&key.session_public_key)
        .bind(&key.session_private_key)
        .bind(&key.scope)
        .bind(key.expires_at.to_rfc3339())
        .bind(key.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionKey>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, wallet_address, session_public_key, session_private_key,
                    scope, expires_at, created_at
             FROM session_keys
             WHERE user_id = ? AND expires_at > ? AND wallet_address != ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(now.to_rfc3339())
        .bind(WAITING_WALLET)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_key_from_row).transpose()
    }

    async fn latest_waiting(
        &self,
        user_id: &str,
    ) -> Result<Option<SessionKey>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, wallet_address, session_public_key, session_private_key,
                    scope, expires_at, created_at
             FROM session_keys
             WHERE user_id = ? AND wallet_address = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(WAITING_WALLET)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_key_from_row).transpose()
    }
}

fn session_key_from_row(row: SqliteRow) -> Result<SessionKey, RepositoryError> {
    Ok(SessionKey {
        id: SessionKeyId(row.get::<String, _>("id")),
        user_id: row.get::<String, _>("user_id"),
        wallet_address: row.get::<String, _>("wallet_address"),
        session_public_key: row.get::<String, _>("session_public_key"),
        session_private_key: row.get::<String, _>("session_private_key"),
        scope: row.get::<String, _>("scope"),
        expires_at: parse_timestamp(&row.get::<String, _>("expires_at"))?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
