use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nlu::{Entities, Intent};

/// A durable key/value belief about a user. Keys are unique per user;
/// writes are upserts and never create duplicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryFact {
    pub user_id: String,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub String);

impl EpisodeId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// One turn of the append-only per-user interaction log. Retention is
/// bounded: every insert prunes rows beyond the configured window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub user_id: String,
    pub ts: DateTime<Utc>,
    pub input_text: String,
    pub intent: Intent,
    pub entities: Entities,
    pub output_text: String,
}

impl Episode {
    pub fn new(
        user_id: impl Into<String>,
        input_text: impl Into<String>,
        intent: Intent,
        entities: Entities,
        output_text: impl Into<String>,
    ) -> Self {
        Self {
            id: EpisodeId::generate(),
            user_id: user_id.into(),
            ts: Utc::now(),
            input_text: input_text.into(),
            intent,
            entities,
            output_text: output_text.into(),
        }
    }
}
