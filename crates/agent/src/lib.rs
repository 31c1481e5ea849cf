//! Courier agent pipeline: the provider router with tiered fallback,
//! the tool dispatcher, retrieval, session-key authority, the transfer
//! safety machine, and the orchestrator that composes them into one
//! reply per inbound message.

pub mod context;
pub mod executor;
pub mod ingest;
pub mod orchestrator;
pub mod providers;
pub mod retrieval;
pub mod safety;
pub mod session;
pub mod tools;

pub use executor::{DisabledExecutor, ExecutionOutcome, TransferExecutor};
pub use orchestrator::Orchestrator;
pub use providers::{
    AskRouter, ChatMessage, CompletionBackend, CompletionRouter, HttpCompletionBackend,
    ProviderCallResult, Role,
};
pub use safety::{ConfirmOutcome, DraftOutcome, SafetyError, TransferSafetyMachine};
pub use tools::{ToolDispatcher, ToolName, ToolOutcome};
