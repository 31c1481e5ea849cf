//! Courier core - pure domain logic for the conversational transfer agent.
//!
//! Everything in this crate is deterministic and free of I/O: text
//! normalization, intent parsing, transfer planning, the skill book,
//! the self-check rewriter, configuration, and the domain types shared
//! by the storage and pipeline crates. Network and persistence live in
//! `courier-db` and `courier-agent`.

pub mod config;
pub mod domain;
pub mod nlu;
pub mod normalize;
pub mod planner;
pub mod rewrite;
pub mod skills;

pub use chrono;
pub use domain::knowledge::{DocumentId, KnowledgeDocument, Passage, PassageId};
pub use domain::memory::{Episode, EpisodeId, MemoryFact};
pub use domain::reply::{CallbackAction, Reply, ReplyButton};
pub use domain::session::{LinkedIdentity, SessionKey, SessionKeyId, WAITING_WALLET};
pub use domain::transfer::{PendingTransfer, RateLimitKind, TransferId, TransferStatus};
pub use nlu::{Entities, Intent, IntentParser, NluResult};
pub use planner::{Plan, PlanKind, PlanStep, StepAction, StepStatus, TransferPlanner};
