//! In-memory repository fakes used by unit tests across the
//! workspace. Behavior mirrors the SQL implementations, including
//! retention pruning and atomic-counter semantics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use courier_core::domain::knowledge::{KnowledgeDocument, Passage};
use courier_core::domain::memory::{Episode, MemoryFact};
use courier_core::domain::session::{LinkedIdentity, SessionKey};
use courier_core::domain::transfer::{PendingTransfer, RateLimitKind, TransferId, TransferStatus};
use courier_core::normalize::tokenize;

use super::{
    EpisodeRepository, FactRepository, IdentityRepository, IngestOutcome, KnowledgeRepository,
    PassageHit, RateLimitRepository, RepositoryError, SessionKeyRepository, TransferRepository,
};

#[derive(Default)]
pub struct InMemoryFactRepository {
    facts: RwLock<HashMap<(String, String), MemoryFact>>,
}

#[async_trait::async_trait]
impl FactRepository for InMemoryFactRepository {
    async fn store(
        &self,
        user_id: &str,
        key: &str,
        value: &str,
        confidence: f64,
    ) -> Result<(), RepositoryError> {
        let mut facts = self.facts.write().await;
        facts.insert(
            (user_id.to_string(), key.to_string()),
            MemoryFact {
                user_id: user_id.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                confidence,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find(&self, user_id: &str, key: &str) -> Result<Option<MemoryFact>, RepositoryError> {
        let facts = self.facts.read().await;
        Ok(facts.get(&(user_id.to_string(), key.to_string())).cloned())
    }

    async fn find_any_user(&self, key: &str) -> Result<Option<MemoryFact>, RepositoryError> {
        let facts = self.facts.read().await;
        let mut matches: Vec<&MemoryFact> =
            facts.values().filter(|fact| fact.key == key).collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches.first().map(|fact| (*fact).clone()))
    }

    async fn all_for_user(&self, user_id: &str) -> Result<Vec<MemoryFact>, RepositoryError> {
        let facts = self.facts.read().await;
        let mut user_facts: Vec<MemoryFact> =
            facts.values().filter(|fact| fact.user_id == user_id).cloned().collect();
        user_facts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(user_facts)
    }
}

#[derive(Default)]
pub struct InMemoryEpisodeRepository {
    episodes: RwLock<Vec<Episode>>,
}

#[async_trait::async_trait]
impl EpisodeRepository for InMemoryEpisodeRepository {
    async fn log(&self, episode: &Episode, retention: u32) -> Result<(), RepositoryError> {
        let mut episodes = self.episodes.write().await;
        episodes.push(episode.clone());

        let mut user_episodes: Vec<usize> = episodes
            .iter()
            .enumerate()
            .filter(|(_, e)| e.user_id == episode.user_id)
            .map(|(i, _)| i)
            .collect();
        user_episodes.sort_by(|a, b| episodes[*b].ts.cmp(&episodes[*a].ts));
        let excess: Vec<usize> = user_episodes.into_iter().skip(retention as usize).collect();
        let mut excess_sorted = excess;
        excess_sorted.sort_unstable_by(|a, b| b.cmp(a));
        for index in excess_sorted {
            episodes.remove(index);
        }
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: u32) -> Result<Vec<Episode>, RepositoryError> {
        let episodes = self.episodes.read().await;
        let mut user_episodes: Vec<Episode> =
            episodes.iter().filter(|e| e.user_id == user_id).cloned().collect();
        user_episodes.sort_by(|a, b| b.ts.cmp(&a.ts));
        user_episodes.truncate(limit as usize);
        Ok(user_episodes)
    }
}

#[derive(Default)]
pub struct InMemoryKnowledgeRepository {
    documents: RwLock<Vec<KnowledgeDocument>>,
    passages: RwLock<Vec<Passage>>,
}

#[async_trait::async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn ingest(
        &self,
        document: KnowledgeDocument,
        passages: Vec<Passage>,
    ) -> Result<IngestOutcome, RepositoryError> {
        let mut documents = self.documents.write().await;
        if let Some(existing) =
            documents.iter().find(|doc| doc.content_hash == document.content_hash)
        {
            return Ok(IngestOutcome::Duplicate(existing.id.clone()));
        }

        let id = document.id.clone();
        documents.push(document);
        self.passages.write().await.extend(passages);
        Ok(IngestOutcome::Created(id))
    }

    async fn candidates(&self, tokens: &[String]) -> Result<Vec<PassageHit>, RepositoryError> {
        let documents = self.documents.read().await;
        let passages = self.passages.read().await;

        let mut hits = Vec::new();
        for passage in passages.iter() {
            let passage_tokens = tokenize(&passage.excerpt);
            if tokens.iter().any(|token| passage_tokens.contains(token)) {
                let Some(document) =
                    documents.iter().find(|doc| doc.id == passage.document_id)
                else {
                    continue;
                };
                hits.push(PassageHit {
                    passage: passage.clone(),
                    title: document.title.clone(),
                    source: document.source.clone(),
                });
            }
        }
        Ok(hits)
    }

    async fn documents(&self) -> Result<Vec<KnowledgeDocument>, RepositoryError> {
        Ok(self.documents.read().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryTransferRepository {
    transfers: RwLock<Vec<PendingTransfer>>,
}

#[async_trait::async_trait]
impl TransferRepository for InMemoryTransferRepository {
    async fn create(&self, transfer: &PendingTransfer) -> Result<(), RepositoryError> {
        self.transfers.write().await.push(transfer.clone());
        Ok(())
    }

    async fn find(&self, id: &TransferId) -> Result<Option<PendingTransfer>, RepositoryError> {
        Ok(self.transfers.read().await.iter().find(|t| &t.id == id).cloned())
    }

    async fn latest_pending(
        &self,
        user_id: &str,
    ) -> Result<Option<PendingTransfer>, RepositoryError> {
        let transfers = self.transfers.read().await;
        let mut pending: Vec<&PendingTransfer> = transfers
            .iter()
            .filter(|t| t.user_id == user_id && t.status == TransferStatus::Pending)
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending.first().map(|t| (*t).clone()))
    }

    async fn mark_executed(&self, id: &TransferId, tx_hash: &str) -> Result<(), RepositoryError> {
        let mut transfers = self.transfers.write().await;
        if let Some(transfer) = transfers.iter_mut().find(|t| &t.id == id) {
            transfer.status = TransferStatus::Executed;
            transfer.tx_hash = Some(tx_hash.to_string());
            transfer.last_error = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &TransferId, error: &str) -> Result<(), RepositoryError> {
        let mut transfers = self.transfers.write().await;
        if let Some(transfer) = transfers.iter_mut().find(|t| &t.id == id) {
            transfer.status = TransferStatus::Failed;
            transfer.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn cancel_pending(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let mut transfers = self.transfers.write().await;
        let mut cancelled = 0;
        for transfer in transfers
            .iter_mut()
            .filter(|t| t.user_id == user_id && t.status == TransferStatus::Pending)
        {
            transfer.status = TransferStatus::Cancelled;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn cancel_one(&self, id: &TransferId) -> Result<bool, RepositoryError> {
        let mut transfers = self.transfers.write().await;
        if let Some(transfer) = transfers
            .iter_mut()
            .find(|t| &t.id == id && t.status == TransferStatus::Pending)
        {
            transfer.status = TransferStatus::Cancelled;
            return Ok(true);
        }
        Ok(false)
    }

    async fn recent_executed(&self, limit: u32) -> Result<Vec<PendingTransfer>, RepositoryError> {
        let transfers = self.transfers.read().await;
        let mut executed: Vec<PendingTransfer> = transfers
            .iter()
            .filter(|t| t.status == TransferStatus::Executed)
            .cloned()
            .collect();
        executed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        executed.truncate(limit as usize);
        Ok(executed)
    }
}

#[derive(Default)]
pub struct InMemorySessionKeyRepository {
    keys: RwLock<Vec<SessionKey>>,
}

#[async_trait::async_trait]
impl SessionKeyRepository for InMemorySessionKeyRepository {
    async fn save(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        let mut keys = self.keys.write().await;
        if let Some(existing) = keys.iter_mut().find(|k| k.id == key.id) {
            *existing = key.clone();
        } else {
            keys.push(key.clone());
        }
        Ok(())
    }

    async fn active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionKey>, RepositoryError> {
        let keys = self.keys.read().await;
        let mut active: Vec<&SessionKey> =
            keys.iter().filter(|k| k.user_id == user_id && k.is_active(now)).collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active.first().map(|k| (*k).clone()))
    }

    async fn latest_waiting(
        &self,
        user_id: &str,
    ) -> Result<Option<SessionKey>, RepositoryError> {
        let keys = self.keys.read().await;
        let mut waiting: Vec<&SessionKey> =
            keys.iter().filter(|k| k.user_id == user_id && k.is_waiting()).collect();
        waiting.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(waiting.first().map(|k| (*k).clone()))
    }
}

#[derive(Default)]
pub struct InMemoryRateLimitRepository {
    windows: RwLock<HashMap<(String, String, RateLimitKind), u32>>,
}

#[async_trait::async_trait]
impl RateLimitRepository for InMemoryRateLimitRepository {
    async fn current(
        &self,
        user_id: &str,
        window_date: &str,
        kind: RateLimitKind,
    ) -> Result<u32, RepositoryError> {
        let windows = self.windows.read().await;
        Ok(*windows.get(&(user_id.to_string(), window_date.to_string(), kind)).unwrap_or(&0))
    }

    async fn increment(
        &self,
        user_id: &str,
        window_date: &str,
        kind: RateLimitKind,
    ) -> Result<u32, RepositoryError> {
        let mut windows = self.windows.write().await;
        let count =
            windows.entry((user_id.to_string(), window_date.to_string(), kind)).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}

#[derive(Default)]
pub struct InMemoryIdentityRepository {
    identities: RwLock<HashMap<String, LinkedIdentity>>,
}

#[async_trait::async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn link(&self, identity: &LinkedIdentity) -> Result<(), RepositoryError> {
        self.identities.write().await.insert(identity.user_id.clone(), identity.clone());
        Ok(())
    }

    async fn find_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<LinkedIdentity>, RepositoryError> {
        let identities = self.identities.read().await;
        Ok(identities.values().find(|identity| identity.handle == handle).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<LinkedIdentity>, RepositoryError> {
        let identities = self.identities.read().await;
        Ok(identities.get(user_id).cloned())
    }
}
