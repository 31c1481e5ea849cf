//! Boundary contract for the execution collaborator. The core treats
//! value transfer as a black box: it hands over session key material
//! and transfer parameters, records the outcome, and nothing else.

use async_trait::async_trait;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded(tx_hash: impl Into<String>) -> Self {
        Self { success: true, tx_hash: Some(tx_hash.into()), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, tx_hash: None, error: Some(error.into()) }
    }
}

#[async_trait]
pub trait TransferExecutor: Send + Sync {
    async fn execute(
        &self,
        session_private_key: &str,
        recipient: &str,
        amount: &Decimal,
        token: &str,
    ) -> ExecutionOutcome;
}

/// Default wiring until a real execution collaborator is attached:
/// every attempt fails loudly instead of pretending to move funds.
pub struct DisabledExecutor;

#[async_trait]
impl TransferExecutor for DisabledExecutor {
    async fn execute(
        &self,
        _session_private_key: &str,
        _recipient: &str,
        _amount: &Decimal,
        _token: &str,
    ) -> ExecutionOutcome {
        ExecutionOutcome::failed("execution collaborator is not configured")
    }
}
