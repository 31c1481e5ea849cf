use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use courier_core::domain::knowledge::{KnowledgeDocument, Passage};
use courier_core::domain::memory::{Episode, MemoryFact};
use courier_core::domain::session::{LinkedIdentity, SessionKey};
use courier_core::domain::transfer::{PendingTransfer, RateLimitKind, TransferId};

pub mod episodes;
pub mod facts;
pub mod identities;
pub mod knowledge;
pub mod memory;
pub mod rate_limits;
pub mod sessions;
pub mod transfers;

pub use episodes::SqlEpisodeRepository;
pub use facts::SqlFactRepository;
pub use identities::SqlIdentityRepository;
pub use knowledge::SqlKnowledgeRepository;
pub use memory::{
    InMemoryEpisodeRepository, InMemoryFactRepository, InMemoryIdentityRepository,
    InMemoryKnowledgeRepository, InMemoryRateLimitRepository, InMemorySessionKeyRepository,
    InMemoryTransferRepository,
};
pub use rate_limits::SqlRateLimitRepository;
pub use sessions::SqlSessionKeyRepository;
pub use transfers::SqlTransferRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait FactRepository: Send + Sync {
    /// Upsert by (user_id, key); last write wins.
    async fn store(
        &self,
        user_id: &str,
        key: &str,
        value: &str,
        confidence: f64,
    ) -> Result<(), RepositoryError>;

    async fn find(&self, user_id: &str, key: &str) -> Result<Option<MemoryFact>, RepositoryError>;

    /// Cross-user lookup by key, used for shared wallet mappings.
    async fn find_any_user(&self, key: &str) -> Result<Option<MemoryFact>, RepositoryError>;

    /// All facts for one user, most recently updated first.
    async fn all_for_user(&self, user_id: &str) -> Result<Vec<MemoryFact>, RepositoryError>;
}

#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    /// Insert and prune beyond `retention` in the same transaction so
    /// the log can never grow unbounded.
    async fn log(&self, episode: &Episode, retention: u32) -> Result<(), RepositoryError>;

    /// Most recent episodes, newest first.
    async fn recent(&self, user_id: &str, limit: u32) -> Result<Vec<Episode>, RepositoryError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum IngestOutcome {
    Created(courier_core::domain::knowledge::DocumentId),
    Duplicate(courier_core::domain::knowledge::DocumentId),
}

/// A candidate passage returned from the term index, joined with its
/// document metadata so callers can apply title-weighted scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct PassageHit {
    pub passage: Passage,
    pub title: String,
    pub source: String,
}

#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Store a document with its passages and term index. Identical
    /// content (same hash) is not re-ingested.
    async fn ingest(
        &self,
        document: KnowledgeDocument,
        passages: Vec<Passage>,
    ) -> Result<IngestOutcome, RepositoryError>;

    /// Candidate passages containing any of the query tokens.
    async fn candidates(&self, tokens: &[String]) -> Result<Vec<PassageHit>, RepositoryError>;

    async fn documents(&self) -> Result<Vec<KnowledgeDocument>, RepositoryError>;
}

#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn create(&self, transfer: &PendingTransfer) -> Result<(), RepositoryError>;

    async fn find(&self, id: &TransferId) -> Result<Option<PendingTransfer>, RepositoryError>;

    /// The most recent pending draft for a user, if any.
    async fn latest_pending(
        &self,
        user_id: &str,
    ) -> Result<Option<PendingTransfer>, RepositoryError>;

    async fn mark_executed(&self, id: &TransferId, tx_hash: &str) -> Result<(), RepositoryError>;

    async fn mark_failed(&self, id: &TransferId, error: &str) -> Result<(), RepositoryError>;

    /// Cancel every pending draft for a user; returns how many rows
    /// changed. Safe to call with none pending.
    async fn cancel_pending(&self, user_id: &str) -> Result<u64, RepositoryError>;

    /// Cancel one draft by id if it is still pending; returns whether
    /// a row changed. Idempotent.
    async fn cancel_one(&self, id: &TransferId) -> Result<bool, RepositoryError>;

    async fn recent_executed(&self, limit: u32) -> Result<Vec<PendingTransfer>, RepositoryError>;
}

#[async_trait]
pub trait SessionKeyRepository: Send + Sync {
    async fn save(&self, key: &SessionKey) -> Result<(), RepositoryError>;

    /// Most recent non-expired, non-waiting key for the user.
    async fn active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionKey>, RepositoryError>;

    /// Most recent awaiting-signature placeholder for the user.
    async fn latest_waiting(&self, user_id: &str)
        -> Result<Option<SessionKey>, RepositoryError>;
}

#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    async fn current(
        &self,
        user_id: &str,
        window_date: &str,
        kind: RateLimitKind,
    ) -> Result<u32, RepositoryError>;

    /// Atomic increment (single upsert statement); returns the new
    /// count for the window.
    async fn increment(
        &self,
        user_id: &str,
        window_date: &str,
        kind: RateLimitKind,
    ) -> Result<u32, RepositoryError>;
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn link(&self, identity: &LinkedIdentity) -> Result<(), RepositoryError>;

    async fn find_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<LinkedIdentity>, RepositoryError>;

    async fn find_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<LinkedIdentity>, RepositoryError>;
}
