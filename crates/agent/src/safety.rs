//! The transfer safety state machine. This is the only component that
//! may hand a draft to the execution collaborator, and it does so only
//! behind two gates: a per-user daily draft rate limit on the way in,
//! and a non-expired, signature-verified session key on the way out.
//!
//! ```text
//! DRAFT REQUEST -> [rate-limit check] -> pending (row + counter)
//! pending -> CONFIRM -> [session-key check] -> executed | failed
//! pending -> CANCEL  -> cancelled
//! pending (anything else) -> remains pending
//! ```

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;

use courier_core::domain::transfer::{
    window_date, PendingTransfer, RateLimitKind, TransferId, TransferStatus,
};
use courier_db::repositories::{
    RateLimitRepository, RepositoryError, SessionKeyRepository, TransferRepository,
};

use crate::executor::TransferExecutor;

/// Storage failures inside the machine. Callers must not report the
/// gated action as successful when one of these surfaces.
#[derive(Debug, Error)]
pub enum SafetyError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DraftOutcome {
    Created(PendingTransfer),
    RateLimited { limit: u32 },
    UnresolvedRecipient { mention: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConfirmOutcome {
    Executed { transfer: PendingTransfer, tx_hash: String },
    Failed { transfer: PendingTransfer, error: String },
    NoPendingTransfer,
    NoActiveSession,
}

pub fn is_hex_address(value: &str) -> bool {
    value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

pub struct TransferSafetyMachine {
    transfers: Arc<dyn TransferRepository>,
    sessions: Arc<dyn SessionKeyRepository>,
    rate_limits: Arc<dyn RateLimitRepository>,
    executor: Arc<dyn TransferExecutor>,
    draft_daily_limit: u32,
}

impl TransferSafetyMachine {
    pub fn new(
        transfers: Arc<dyn TransferRepository>,
        sessions: Arc<dyn SessionKeyRepository>,
        rate_limits: Arc<dyn RateLimitRepository>,
        executor: Arc<dyn TransferExecutor>,
        draft_daily_limit: u32,
    ) -> Self {
        Self { transfers, sessions, rate_limits, executor, draft_daily_limit }
    }

    /// Create a pending draft. Entry conditions: the recipient must
    /// already be a concrete hex address, and the user must be under
    /// the daily draft window. Refusals create no row.
    pub async fn draft(
        &self,
        user_id: &str,
        recipient: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<DraftOutcome, SafetyError> {
        if !is_hex_address(recipient) {
            return Ok(DraftOutcome::UnresolvedRecipient { mention: recipient.to_string() });
        }

        let today = window_date(Utc::now());
        let used = self.rate_limits.current(user_id, &today, RateLimitKind::Draft).await?;
        if used >= self.draft_daily_limit {
            tracing::warn!(
                user_id,
                used,
                limit = self.draft_daily_limit,
                "draft refused by daily rate gate"
            );
            return Ok(DraftOutcome::RateLimited { limit: self.draft_daily_limit });
        }

        let transfer = PendingTransfer::draft(user_id, recipient, token, amount);
        self.transfers.create(&transfer).await?;
        self.rate_limits.increment(user_id, &today, RateLimitKind::Draft).await?;

        tracing::info!(
            user_id,
            transfer_id = %transfer.id.0,
            token,
            "transfer draft created"
        );
        Ok(DraftOutcome::Created(transfer))
    }

    /// Confirm the most recent pending draft for the user.
    pub async fn confirm_latest(&self, user_id: &str) -> Result<ConfirmOutcome, SafetyError> {
        let Some(transfer) = self.transfers.latest_pending(user_id).await? else {
            return Ok(ConfirmOutcome::NoPendingTransfer);
        };
        self.confirm(transfer).await
    }

    /// Confirm a specific draft (button callbacks carry the id). The
    /// row must belong to the user and still be pending.
    pub async fn confirm_by_id(
        &self,
        user_id: &str,
        id: &TransferId,
    ) -> Result<ConfirmOutcome, SafetyError> {
        let Some(transfer) = self.transfers.find(id).await? else {
            return Ok(ConfirmOutcome::NoPendingTransfer);
        };
        if transfer.user_id != user_id || transfer.status != TransferStatus::Pending {
            return Ok(ConfirmOutcome::NoPendingTransfer);
        }
        self.confirm(transfer).await
    }

    async fn confirm(&self, transfer: PendingTransfer) -> Result<ConfirmOutcome, SafetyError> {
        let Some(session) =
            self.sessions.active_for_user(&transfer.user_id, Utc::now()).await?
        else {
            // Gate failure is terminal for this turn; the draft stays
            // pending and nothing is retried automatically.
            return Ok(ConfirmOutcome::NoActiveSession);
        };

        let outcome = self
            .executor
            .execute(
                &session.session_private_key,
                &transfer.recipient,
                &transfer.amount,
                &transfer.token,
            )
            .await;

        match (outcome.success, outcome.tx_hash) {
            (true, Some(tx_hash)) => {
                self.transfers.mark_executed(&transfer.id, &tx_hash).await?;
                tracing::info!(
                    user_id = %transfer.user_id,
                    transfer_id = %transfer.id.0,
                    tx_hash = %tx_hash,
                    "transfer executed"
                );
                Ok(ConfirmOutcome::Executed { transfer, tx_hash })
            }
            _ => {
                let error =
                    outcome.error.unwrap_or_else(|| "execution returned no hash".to_string());
                self.transfers.mark_failed(&transfer.id, &error).await?;
                tracing::warn!(
                    user_id = %transfer.user_id,
                    transfer_id = %transfer.id.0,
                    error = %error,
                    "transfer execution failed"
                );
                Ok(ConfirmOutcome::Failed { transfer, error })
            }
        }
    }

    /// Cancel every pending draft. Idempotent.
    pub async fn cancel_all(&self, user_id: &str) -> Result<u64, SafetyError> {
        Ok(self.transfers.cancel_pending(user_id).await?)
    }

    /// Cancel one draft by id. Idempotent; returns whether a pending
    /// row was actually cancelled.
    pub async fn cancel_by_id(
        &self,
        user_id: &str,
        id: &TransferId,
    ) -> Result<bool, SafetyError> {
        let Some(transfer) = self.transfers.find(id).await? else {
            return Ok(false);
        };
        if transfer.user_id != user_id {
            return Ok(false);
        }
        Ok(self.transfers.cancel_one(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use courier_core::domain::session::{SessionKey, SessionKeyId, WAITING_WALLET};
    use courier_core::domain::transfer::TransferStatus;
    use courier_db::repositories::{
        InMemoryRateLimitRepository, InMemorySessionKeyRepository, InMemoryTransferRepository,
        SessionKeyRepository, TransferRepository,
    };

    use crate::executor::{ExecutionOutcome, TransferExecutor};

    use super::{is_hex_address, ConfirmOutcome, DraftOutcome, TransferSafetyMachine};

    const RECIPIENT: &str = "0xaa00000000000000000000000000000000000001";

    struct ScriptedExecutor {
        outcomes: Mutex<Vec<ExecutionOutcome>>,
    }

    impl ScriptedExecutor {
        fn succeeding() -> Self {
            Self { outcomes: Mutex::new(vec![ExecutionOutcome::succeeded("0xhash")]) }
        }

        fn failing(message: &str) -> Self {
            Self { outcomes: Mutex::new(vec![ExecutionOutcome::failed(message)]) }
        }
    }

    #[async_trait]
    impl TransferExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            _key: &str,
            _recipient: &str,
            _amount: &Decimal,
            _token: &str,
        ) -> ExecutionOutcome {
            self.outcomes.lock().await.remove(0)
        }
    }

    struct Fixture {
        transfers: Arc<InMemoryTransferRepository>,
        sessions: Arc<InMemorySessionKeyRepository>,
        machine: TransferSafetyMachine,
    }

    fn fixture(executor: ScriptedExecutor, limit: u32) -> Fixture {
        let transfers = Arc::new(InMemoryTransferRepository::default());
        let sessions = Arc::new(InMemorySessionKeyRepository::default());
        let machine = TransferSafetyMachine::new(
            transfers.clone(),
            sessions.clone(),
            Arc::new(InMemoryRateLimitRepository::default()),
            Arc::new(executor),
            limit,
        );
        Fixture { transfers, sessions, machine }
    }

    async fn activate_session(sessions: &InMemorySessionKeyRepository, user_id: &str) {
        let now = Utc::now();
        sessions
            .save(&SessionKey {
                id: SessionKeyId::generate(),
                user_id: user_id.to_string(),
                wallet_address: "0xwallet".to_string(),
                session_public_key: "0xpub".to_string(),
                session_private_key: "0xpriv".to_string(),
                scope: "transfer".to_string(),
                expires_at: now + Duration::hours(24),
                created_at: now,
            })
            .await
            .expect("save session");
    }

    #[test]
    fn hex_address_predicate() {
        assert!(is_hex_address(RECIPIENT));
        assert!(!is_hex_address("@sam"));
        assert!(!is_hex_address("0x123"));
        assert!(!is_hex_address("0xzz00000000000000000000000000000000000001"));
    }

    #[tokio::test]
    async fn sixth_draft_in_a_day_is_refused_without_a_row() {
        let f = fixture(ScriptedExecutor::succeeding(), 5);

        for _ in 0..5 {
            let outcome = f
                .machine
                .draft("u1", RECIPIENT, "USDC", Decimal::ONE)
                .await
                .expect("draft");
            assert!(matches!(outcome, DraftOutcome::Created(_)));
        }

        let refused =
            f.machine.draft("u1", RECIPIENT, "USDC", Decimal::ONE).await.expect("draft");
        assert_eq!(refused, DraftOutcome::RateLimited { limit: 5 });

        // Exactly five rows exist; the refusal created nothing.
        assert_eq!(f.transfers.cancel_pending("u1").await.expect("cancel"), 5);
    }

    #[tokio::test]
    async fn unresolved_handle_never_creates_a_row() {
        let f = fixture(ScriptedExecutor::succeeding(), 5);
        let outcome = f.machine.draft("u1", "@sam", "USDC", Decimal::ONE).await.expect("draft");
        assert_eq!(outcome, DraftOutcome::UnresolvedRecipient { mention: "@sam".to_string() });
        assert!(f.transfers.latest_pending("u1").await.expect("latest").is_none());
    }

    #[tokio::test]
    async fn confirm_without_session_keeps_draft_pending() {
        let f = fixture(ScriptedExecutor::succeeding(), 5);
        let DraftOutcome::Created(transfer) =
            f.machine.draft("u1", RECIPIENT, "USDC", Decimal::ONE).await.expect("draft")
        else {
            panic!("expected created draft");
        };

        let outcome = f.machine.confirm_latest("u1").await.expect("confirm");
        assert_eq!(outcome, ConfirmOutcome::NoActiveSession);

        let row = f.transfers.find(&transfer.id).await.expect("find").expect("row");
        assert_eq!(row.status, TransferStatus::Pending);
    }

    #[tokio::test]
    async fn waiting_placeholder_does_not_satisfy_the_session_gate() {
        let f = fixture(ScriptedExecutor::succeeding(), 5);
        let now = Utc::now();
        f.sessions
            .save(&SessionKey {
                id: SessionKeyId::generate(),
                user_id: "u1".to_string(),
                wallet_address: WAITING_WALLET.to_string(),
                session_public_key: "0xpub".to_string(),
                session_private_key: "0xpriv".to_string(),
                scope: "transfer".to_string(),
                expires_at: now + Duration::hours(24),
                created_at: now,
            })
            .await
            .expect("save waiting key");

        f.machine.draft("u1", RECIPIENT, "USDC", Decimal::ONE).await.expect("draft");
        let outcome = f.machine.confirm_latest("u1").await.expect("confirm");
        assert_eq!(outcome, ConfirmOutcome::NoActiveSession);
    }

    #[tokio::test]
    async fn confirm_with_active_session_executes_latest_draft() {
        let f = fixture(ScriptedExecutor::succeeding(), 5);
        activate_session(&f.sessions, "u1").await;
        f.machine.draft("u1", RECIPIENT, "USDC", Decimal::ONE).await.expect("draft");

        let outcome = f.machine.confirm_latest("u1").await.expect("confirm");
        let ConfirmOutcome::Executed { transfer, tx_hash } = outcome else {
            panic!("expected executed outcome");
        };
        assert_eq!(tx_hash, "0xhash");

        let row = f.transfers.find(&transfer.id).await.expect("find").expect("row");
        assert_eq!(row.status, TransferStatus::Executed);
        assert_eq!(row.tx_hash.as_deref(), Some("0xhash"));
    }

    #[tokio::test]
    async fn failed_execution_marks_failed_and_is_not_retried() {
        let f = fixture(ScriptedExecutor::failing("insufficient funds"), 5);
        activate_session(&f.sessions, "u1").await;
        f.machine.draft("u1", RECIPIENT, "USDC", Decimal::ONE).await.expect("draft");

        let outcome = f.machine.confirm_latest("u1").await.expect("confirm");
        let ConfirmOutcome::Failed { transfer, error } = outcome else {
            panic!("expected failed outcome");
        };
        assert_eq!(error, "insufficient funds");

        let row = f.transfers.find(&transfer.id).await.expect("find").expect("row");
        assert_eq!(row.status, TransferStatus::Failed);

        // A follow-up confirm finds nothing pending: the failed row is
        // terminal, never silently retried.
        let outcome = f.machine.confirm_latest("u1").await.expect("confirm");
        assert_eq!(outcome, ConfirmOutcome::NoPendingTransfer);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_scoped_to_owner() {
        let f = fixture(ScriptedExecutor::succeeding(), 5);
        let DraftOutcome::Created(transfer) =
            f.machine.draft("u1", RECIPIENT, "USDC", Decimal::ONE).await.expect("draft")
        else {
            panic!("expected created draft");
        };

        assert!(!f.machine.cancel_by_id("intruder", &transfer.id).await.expect("cancel"));
        assert!(f.machine.cancel_by_id("u1", &transfer.id).await.expect("cancel"));
        assert!(!f.machine.cancel_by_id("u1", &transfer.id).await.expect("cancel again"));
        assert_eq!(f.machine.cancel_all("u1").await.expect("cancel all"), 0);
    }

    #[tokio::test]
    async fn confirm_by_id_ignores_foreign_or_terminal_rows() {
        let f = fixture(ScriptedExecutor::succeeding(), 5);
        activate_session(&f.sessions, "u1").await;
        let DraftOutcome::Created(transfer) =
            f.machine.draft("u1", RECIPIENT, "USDC", Decimal::ONE).await.expect("draft")
        else {
            panic!("expected created draft");
        };

        let foreign = f.machine.confirm_by_id("intruder", &transfer.id).await.expect("confirm");
        assert_eq!(foreign, ConfirmOutcome::NoPendingTransfer);

        f.machine.cancel_by_id("u1", &transfer.id).await.expect("cancel");
        let cancelled = f.machine.confirm_by_id("u1", &transfer.id).await.expect("confirm");
        assert_eq!(cancelled, ConfirmOutcome::NoPendingTransfer);
    }
}
