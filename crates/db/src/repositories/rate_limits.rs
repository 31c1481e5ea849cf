use sqlx::Row;

use courier_core::domain::transfer::RateLimitKind;

use super::{RateLimitRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRateLimitRepository {
    pool: DbPool,
}

impl SqlRateLimitRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RateLimitRepository for SqlRateLimitRepository {
    async fn current(
        &self,
        user_id: &str,
        window_date: &str,
        kind: RateLimitKind,
    ) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT count FROM rate_limit_windows
             WHERE user_id = ? AND window_date = ? AND kind = ?",
        )
        .bind(user_id)
        .bind(window_date)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<i64, _>("count") as u32).unwrap_or(0))
    }

    async fn increment(
        &self,
        user_id: &str,
        window_date: &str,
        kind: RateLimitKind,
    ) -> Result<u32, RepositoryError> {
        // One statement: the counter never goes through application
        // code, so concurrent increments cannot lose updates.
        let row = sqlx::query(
            "INSERT INTO rate_limit_windows (user_id, window_date, kind, count)
             VALUES (?, ?, ?, 1)
             ON CONFLICT(user_id, window_date, kind)
                DO UPDATE SET count = count + 1
             RETURNING count",
        )
        .bind(user_id)
        .bind(window_date)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("count") as u32)
    }
}
