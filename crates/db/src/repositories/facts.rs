use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::memory::MemoryFact;

use super::{FactRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFactRepository {
    pool: DbPool,
}

impl SqlFactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FactRepository for SqlFactRepository {
    async fn store(
        &self,
        user_id: &str,
        key: &str,
        value: &str,
        confidence: f64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_facts (user_id, key, value, confidence, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, key) DO UPDATE SET
                value = excluded.value,
                confidence = excluded.confidence,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(key)
        .bind(value)
        .bind(confidence)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, user_id: &str, key: &str) -> Result<Option<MemoryFact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, key, value, confidence, updated_at
             FROM user_facts
             WHERE user_id = ? AND key = ?",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(fact_from_row).transpose()
    }

    async fn find_any_user(&self, key: &str) -> Result<Option<MemoryFact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, key, value, confidence, updated_at
             FROM user_facts
             WHERE key = ?
             ORDER BY updated_at DESC
             LIMIT 1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(fact_from_row).transpose()
    }

    async fn all_for_user(&self, user_id: &str) -> Result<Vec<MemoryFact>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, key, value, confidence, updated_at
             FROM user_facts
             WHERE user_id = ?
             ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(fact_from_row).collect()
    }
}

fn fact_from_row(row: SqliteRow) -> Result<MemoryFact, RepositoryError> {
    Ok(MemoryFact {
        user_id: row.get::<String, _>("user_id"),
        key: row.get::<String, _>("key"),
        value: row.get::<String, _>("value"),
        confidence: row.get::<f64, _>("confidence"),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("invalid timestamp `{value}`: {err}")))
}
