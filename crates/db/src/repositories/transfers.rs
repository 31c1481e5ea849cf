use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::transfer::{PendingTransfer, TransferId, TransferStatus};

use super::facts::parse_timestamp;
use super::{RepositoryError, TransferRepository};
use crate::DbPool;

pub struct SqlTransferRepository {
    pool: DbPool,
}

impl SqlTransferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TransferRepository for SqlTransferRepository {
    async fn create(&self, transfer: &PendingTransfer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pending_transfers
                (id, user_id, recipient, token, amount, status, tx_hash, last_error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&transfer.id.0)
        .bind(&transfer.user_id)
        .bind(&transfer.recipient)
        .bind(&transfer.token)
        .bind(transfer.amount.to_string())
        .bind(transfer.status.as_str())
        .bind(transfer.tx_hash.as_deref())
        .bind(transfer.last_error.as_deref())
        .bind(transfer.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: &TransferId) -> Result<Option<PendingTransfer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, recipient, token, amount, status, tx_hash, last_error, created_at
             FROM pending_transfers
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(transfer_from_row).transpose()
    }

    async fn latest_pending(
        &self,
        user_id: &str,
    ) -> Result<Option<PendingTransfer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, recipient, token, amount, status, tx_hash, last_error, created_at
             FROM pending_transfers
             WHERE user_id = ? AND status = 'pending'
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(transfer_from_row).transpose()
    }

    async fn mark_executed(&self, id: &TransferId, tx_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE pending_transfers
             SET status = 'executed', tx_hash = ?, last_error = NULL
             WHERE id = ?",
        )
        .bind(tx_hash)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: &TransferId, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE pending_transfers
             SET status = 'failed', last_error = ?
             WHERE id = ?",
        )
        .bind(error)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cancel_pending(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE pending_transfers
             SET status = 'cancelled'
             WHERE user_id = ? AND status = 'pending'",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn cancel_one(&self, id: &TransferId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE pending_transfers
             SET status = 'cancelled'
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recent_executed(&self, limit: u32) -> Result<Vec<PendingTransfer>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, recipient, token, amount, status, tx_hash, last_error, created_at
             FROM pending_transfers
             WHERE status = 'executed'
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transfer_from_row).collect()
    }
}

fn transfer_from_row(row: SqliteRow) -> Result<PendingTransfer, RepositoryError> {
    let status_raw = row.get::<String, _>("status");
    let status = TransferStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown transfer status `{status_raw}`")))?;

    let amount_raw = row.get::<String, _>("amount");
    let amount = amount_raw
        .parse::<Decimal>()
        .map_err(|err| RepositoryError::Decode(format!("invalid amount `{amount_raw}`: {err}")))?;

    Ok(PendingTransfer {
        id: TransferId(row.get::<String, _>("id")),
        user_id: row.get::<String, _>("user_id"),
        recipient: row.get::<String, _>("recipient"),
        token: row.get::<String, _>("token"),
        amount,
        status,
        tx_hash: row.get::<Option<String>, _>("tx_hash"),
        last_error: row.get::<Option<String>, _>("last_error"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
