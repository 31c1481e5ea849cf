use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(pub String);

impl TransferId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Executed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "executed" => Some(Self::Executed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A drafted, unexecuted fund transfer awaiting confirmation. The row
/// only exists once amount, token, and a resolved recipient address
/// are all known; a bare confirm targets the most recent pending row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub id: TransferId,
    pub user_id: String,
    pub recipient: String,
    pub token: String,
    pub amount: Decimal,
    pub status: TransferStatus,
    pub tx_hash: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingTransfer {
    pub fn draft(
        user_id: impl Into<String>,
        recipient: impl Into<String>,
        token: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: TransferId::generate(),
            user_id: user_id.into(),
            recipient: recipient.into(),
            token: token.into(),
            amount,
            status: TransferStatus::Pending,
            tx_hash: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}

/// Counter kinds sharing the per-user day-window table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKind {
    Draft,
    Completion,
}

impl RateLimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Completion => "completion",
        }
    }
}

/// The UTC day bucket used for rate-limit windows. A new day resets
/// every counter because the primary key includes the date.
pub fn window_date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}
