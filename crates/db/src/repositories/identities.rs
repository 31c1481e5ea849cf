use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::session::LinkedIdentity;

use super::facts::parse_timestamp;
use super::{IdentityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlIdentityRepository {
    pool: DbPool,
}

impl SqlIdentityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl IdentityRepository for SqlIdentityRepository {
    async fn link(&self, identity: &LinkedIdentity) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO linked_identities
                (user_id, handle, wallet_address, linked_account_id, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                handle = excluded.handle,
                wallet_address = excluded.wallet_address,
                linked_account_id = excluded.linked_account_id",
        )
        .bind(&identity.user_id)
        .bind(&identity.handle)
        .bind(&identity.wallet_address)
        .bind(identity.linked_account_id.as_deref())
        .bind(identity.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<LinkedIdentity>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, handle, wallet_address, linked_account_id, created_at
             FROM linked_identities
             WHERE handle = ?
             LIMIT 1",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        row.map(identity_from_row).transpose()
    }

    async fn find_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<LinkedIdentity>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, handle, wallet_address, linked_account_id, created_at
             FROM linked_identities
             WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(identity_from_row).transpose()
    }
}

fn identity_from_row(row: SqliteRow) -> Result<LinkedIdentity, RepositoryError> {
    Ok(LinkedIdentity {
        user_id: row.get::<String, _>("user_id"),
        handle: row.get::<String, _>("handle"),
        wallet_address: row.get::<String, _>("wallet_address"),
        linked_account_id: row.get::<Option<String>, _>("linked_account_id"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
