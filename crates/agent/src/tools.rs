//! Named tool dispatch. Tool identifiers are a closed enum so a new
//! tool is a compile-time concern, while wire-level dispatch by string
//! still folds unknown names into a failed envelope. Tools never
//! propagate errors: every outcome, success or failure, is a value.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::timeout;

use courier_core::domain::knowledge::{content_hash, split_passages, DocumentId, KnowledgeDocument};
use courier_core::normalize::tokenize;
use courier_db::repositories::{
    FactRepository, IdentityRepository, IngestOutcome, KnowledgeRepository, PassageHit,
    RepositoryError, TransferRepository,
};

use crate::ingest::{extract_content, summarize};
use crate::retrieval::score_passage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolName {
    MemoryGet,
    MemoryAdd,
    KnowledgeAsk,
    KnowledgeSearch,
    KnowledgeIngest,
    RecentEvents,
    ResolveRecipient,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryGet => "memory_get",
            Self::MemoryAdd => "memory_add",
            Self::KnowledgeAsk => "knowledge_ask",
            Self::KnowledgeSearch => "knowledge_search",
            Self::KnowledgeIngest => "knowledge_ingest",
            Self::RecentEvents => "recent_events",
            Self::ResolveRecipient => "resolve_recipient",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory_get" => Some(Self::MemoryGet),
            "memory_add" => Some(Self::MemoryAdd),
            "knowledge_ask" => Some(Self::KnowledgeAsk),
            "knowledge_search" => Some(Self::KnowledgeSearch),
            "knowledge_ingest" => Some(Self::KnowledgeIngest),
            "recent_events" => Some(Self::RecentEvents),
            "resolve_recipient" => Some(Self::ResolveRecipient),
            _ => None,
        }
    }
}

/// Uniform result envelope. `success: false` carries a descriptive
/// error; the orchestrator treats it as context, never as an abort.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutcome {
    pub tool: String,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutcome {
    fn ok(tool: ToolName, result: Value) -> Self {
        Self { tool: tool.as_str().to_string(), success: true, result: Some(result), error: None }
    }

    fn fail(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self { tool: tool.into(), success: false, result: None, error: Some(error.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedDocument {
    pub text: String,
    pub content_type: String,
    pub status: u16,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch timed out")]
    Timeout,
    #[error("content too large (max {limit} bytes)")]
    TooLarge { limit: usize },
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("http status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

const FETCH_TIMEOUT_SECS: u64 = 10;
const MAX_FETCH_BYTES: usize = 1_500_000;
const CONTENT_TYPE_ALLOWLIST: &[&str] =
    &["text/html", "application/json", "application/xml", "text/plain"];

pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpDocumentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let round_trip = async {
            let response = self
                .client
                .get(url)
                .header("User-Agent", "courier-agent/0.1 (+knowledge ingest)")
                .send()
                .await
                .map_err(|err| FetchError::Network(err.to_string()))?;

            let status = response.status().as_u16();
            if !(200..300).contains(&status) {
                return Err(FetchError::Http(status));
            }

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_string();
            if !CONTENT_TYPE_ALLOWLIST.iter().any(|allowed| content_type.contains(allowed)) {
                return Err(FetchError::UnsupportedContentType(content_type));
            }

            if let Some(length) = response.content_length() {
                if length as usize > MAX_FETCH_BYTES {
                    return Err(FetchError::TooLarge { limit: MAX_FETCH_BYTES });
                }
            }

            let text =
                response.text().await.map_err(|err| FetchError::Network(err.to_string()))?;
            if text.len() > MAX_FETCH_BYTES {
                return Err(FetchError::TooLarge { limit: MAX_FETCH_BYTES });
            }

            Ok(FetchedDocument { text, content_type, status })
        };

        timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS), round_trip)
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

pub struct ToolDispatcher {
    facts: Arc<dyn FactRepository>,
    knowledge: Arc<dyn KnowledgeRepository>,
    transfers: Arc<dyn TransferRepository>,
    identities: Arc<dyn IdentityRepository>,
    fetcher: Arc<dyn DocumentFetcher>,
}

impl ToolDispatcher {
    pub fn new(
        facts: Arc<dyn FactRepository>,
        knowledge: Arc<dyn KnowledgeRepository>,
        transfers: Arc<dyn TransferRepository>,
        identities: Arc<dyn IdentityRepository>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self { facts, knowledge, transfers, identities, fetcher }
    }

    /// Wire-level entry point: unknown names fold into a failed
    /// envelope instead of an error.
    pub async fn dispatch(&self, name: &str, params: &Value) -> ToolOutcome {
        match ToolName::parse(name) {
            Some(tool) => self.execute(tool, params).await,
            None => ToolOutcome::fail(name, format!("unknown tool: {name}")),
        }
    }

    pub async fn execute(&self, tool: ToolName, params: &Value) -> ToolOutcome {
        match tool {
            ToolName::MemoryGet => self.memory_get(params).await,
            ToolName::MemoryAdd => self.memory_add(params).await,
            ToolName::KnowledgeAsk => self.knowledge_ask(params).await,
            ToolName::KnowledgeSearch => self.knowledge_search(params).await,
            ToolName::KnowledgeIngest => self.knowledge_ingest(params).await,
            ToolName::RecentEvents => self.recent_events(params).await,
            ToolName::ResolveRecipient => self.resolve_recipient(params).await,
        }
    }

    async fn memory_get(&self, params: &Value) -> ToolOutcome {
        let Some(user_id) = params["user_id"].as_str() else {
            return ToolOutcome::fail(ToolName::MemoryGet.as_str(), "missing user_id");
        };

        match self.facts.all_for_user(user_id).await {
            Ok(facts) => match serde_json::to_value(&facts) {
                Ok(value) => ToolOutcome::ok(ToolName::MemoryGet, value),
                Err(err) => ToolOutcome::fail(ToolName::MemoryGet.as_str(), err.to_string()),
            },
            Err(err) => repository_failure(ToolName::MemoryGet, err),
        }
    }

    async fn memory_add(&self, params: &Value) -> ToolOutcome {
        let (Some(user_id), Some(key), Some(value)) =
            (params["user_id"].as_str(), params["key"].as_str(), params["value"].as_str())
        else {
            return ToolOutcome::fail(
                ToolName::MemoryAdd.as_str(),
                "missing user_id, key, or value",
            );
        };
        let confidence = params["confidence"].as_f64().unwrap_or(1.0);

        match self.facts.store(user_id, key, value, confidence).await {
            Ok(()) => ToolOutcome::ok(
                ToolName::MemoryAdd,
                json!({ "key": key, "value": value, "confidence": confidence }),
            ),
            Err(err) => repository_failure(ToolName::MemoryAdd, err),
        }
    }

    async fn knowledge_ask(&self, params: &Value) -> ToolOutcome {
        let Some(question) = params["question"].as_str() else {
            return ToolOutcome::fail(ToolName::KnowledgeAsk.as_str(), "missing question");
        };

        let hits = match self.ranked_passages(question, 3).await {
            Ok(hits) => hits,
            Err(err) => return repository_failure(ToolName::KnowledgeAsk, err),
        };
        if hits.is_empty() {
            return ToolOutcome::fail(
                ToolName::KnowledgeAsk.as_str(),
                "no relevant citations found",
            );
        }

        let mut answer = String::from("Here's what I have on file:\n");
        for (index, (hit, _)) in hits.iter().enumerate() {
            answer.push_str(&format!("• {} [{}]\n", hit.passage.excerpt, index + 1));
        }
        let citations: Vec<Value> = hits
            .iter()
            .map(|(hit, _)| json!({ "title": hit.title, "source": hit.source }))
            .collect();

        ToolOutcome::ok(
            ToolName::KnowledgeAsk,
            json!({ "answer": answer.trim_end(), "citations": citations }),
        )
    }

    async fn knowledge_search(&self, params: &Value) -> ToolOutcome {
        let Some(query) = params["query"].as_str() else {
            return ToolOutcome::fail(ToolName::KnowledgeSearch.as_str(), "missing query");
        };

        match self.ranked_passages(query, 5).await {
            Ok(hits) => {
                let results: Vec<Value> = hits
                    .into_iter()
                    .map(|(hit, score)| {
                        json!({
                            "title": hit.title,
                            "source": hit.source,
                            "excerpt": hit.passage.excerpt,
                            "score": score,
                        })
                    })
                    .collect();
                ToolOutcome::ok(ToolName::KnowledgeSearch, Value::Array(results))
            }
            Err(err) => repository_failure(ToolName::KnowledgeSearch, err),
        }
    }

    async fn knowledge_ingest(&self, params: &Value) -> ToolOutcome {
        let Some(url) = params["url"].as_str() else {
            return ToolOutcome::fail(ToolName::KnowledgeIngest.as_str(), "missing url");
        };

        let fetched = match self.fetcher.fetch(url).await {
            Ok(fetched) => fetched,
            Err(err) => return ToolOutcome::fail(ToolName::KnowledgeIngest.as_str(), err.to_string()),
        };

        let extracted = extract_content(&fetched.text, url, &fetched.content_type);
        if extracted.content.trim().is_empty() {
            return ToolOutcome::fail(
                ToolName::KnowledgeIngest.as_str(),
                "document contained no extractable text",
            );
        }

        let document_id = DocumentId::generate();
        let document = KnowledgeDocument {
            id: document_id.clone(),
            title: extracted.title.clone(),
            source: url.to_string(),
            content_hash: content_hash(&extracted.content),
            created_at: Utc::now(),
        };
        let passages = split_passages(&document_id, &extracted.content);
        let tldr = summarize(&extracted.content);

        match self.knowledge.ingest(document, passages).await {
            Ok(IngestOutcome::Created(id)) => ToolOutcome::ok(
                ToolName::KnowledgeIngest,
                json!({ "document_id": id.0, "title": extracted.title, "tldr": tldr, "duplicate": false }),
            ),
            Ok(IngestOutcome::Duplicate(id)) => ToolOutcome::ok(
                ToolName::KnowledgeIngest,
                json!({ "document_id": id.0, "title": extracted.title, "tldr": tldr, "duplicate": true }),
            ),
            Err(err) => repository_failure(ToolName::KnowledgeIngest, err),
        }
    }

    async fn recent_events(&self, params: &Value) -> ToolOutcome {
        let limit = params["limit"].as_u64().unwrap_or(5) as u32;

        match self.transfers.recent_executed(limit).await {
            Ok(transfers) => {
                let events: Vec<Value> = transfers
                    .iter()
                    .map(|transfer| {
                        json!({
                            "recipient": transfer.recipient,
                            "token": transfer.token,
                            "amount": transfer.amount.to_string(),
                            "tx_hash": transfer.tx_hash,
                            "created_at": transfer.created_at.to_rfc3339(),
                        })
                    })
                    .collect();
                ToolOutcome::ok(ToolName::RecentEvents, Value::Array(events))
            }
            Err(err) => repository_failure(ToolName::RecentEvents, err),
        }
    }

    async fn resolve_recipient(&self, params: &Value) -> ToolOutcome {
        let Some(mention) = params["mention"].as_str() else {
            return ToolOutcome::fail(ToolName::ResolveRecipient.as_str(), "missing mention");
        };
        let handle = mention.trim_start_matches('@').to_lowercase();

        match self.facts.find_any_user(&format!("wallet_{handle}")).await {
            Ok(Some(fact)) => {
                return ToolOutcome::ok(
                    ToolName::ResolveRecipient,
                    json!({ "address": fact.value, "source": "memory" }),
                );
            }
            Ok(None) => {}
            Err(err) => return repository_failure(ToolName::ResolveRecipient, err),
        }

        match self.identities.find_by_handle(&handle).await {
            Ok(Some(identity)) => ToolOutcome::ok(
                ToolName::ResolveRecipient,
                json!({ "address": identity.wallet_address, "source": "identity" }),
            ),
            Ok(None) => ToolOutcome::fail(
                ToolName::ResolveRecipient.as_str(),
                format!("no wallet on file for @{handle}"),
            ),
            Err(err) => repository_failure(ToolName::ResolveRecipient, err),
        }
    }

    async fn ranked_passages(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(PassageHit, f64)>, RepositoryError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(PassageHit, f64)> = self
            .knowledge
            .candidates(&tokens)
            .await?
            .into_iter()
            .map(|hit| {
                let score = score_passage(&tokens, &hit.title, &hit.passage.excerpt);
                (hit, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn repository_failure(tool: ToolName, err: RepositoryError) -> ToolOutcome {
    tracing::warn!(tool = tool.as_str(), error = %err, "tool hit a storage failure");
    ToolOutcome::fail(tool.as_str(), err.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    use courier_core::domain::session::LinkedIdentity;
    use courier_db::repositories::{
        FactRepository, IdentityRepository, InMemoryFactRepository, InMemoryIdentityRepository,
        InMemoryKnowledgeRepository, InMemoryTransferRepository,
    };

    use super::{
        DocumentFetcher, FetchError, FetchedDocument, ToolDispatcher, ToolName, ToolOutcome,
    };

    struct StaticFetcher {
        document: Result<FetchedDocument, &'static str>,
    }

    #[async_trait]
    impl DocumentFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedDocument, FetchError> {
            match &self.document {
                Ok(document) => Ok(document.clone()),
                Err(message) => Err(FetchError::Network((*message).to_string())),
            }
        }
    }

    fn dispatcher_with_fetcher(fetcher: StaticFetcher) -> (ToolDispatcher, Arc<InMemoryFactRepository>) {
        let facts = Arc::new(InMemoryFactRepository::default());
        let dispatcher = ToolDispatcher::new(
            facts.clone(),
            Arc::new(InMemoryKnowledgeRepository::default()),
            Arc::new(InMemoryTransferRepository::default()),
            Arc::new(InMemoryIdentityRepository::default()),
            Arc::new(fetcher),
        );
        (dispatcher, facts)
    }

    fn dispatcher() -> (ToolDispatcher, Arc<InMemoryFactRepository>) {
        dispatcher_with_fetcher(StaticFetcher { document: Err("offline") })
    }

    fn assert_failed(outcome: &ToolOutcome, fragment: &str) {
        assert!(!outcome.success);
        assert!(outcome.result.is_none());
        assert!(
            outcome.error.as_deref().unwrap_or("").contains(fragment),
            "error `{:?}` should contain `{fragment}`",
            outcome.error
        );
    }

    #[tokio::test]
    async fn unknown_tool_names_fold_into_failed_envelope() {
        let (dispatcher, _) = dispatcher();
        let outcome = dispatcher.dispatch("launch_rocket", &json!({})).await;
        assert_eq!(outcome.tool, "launch_rocket");
        assert_failed(&outcome, "unknown tool");
    }

    #[tokio::test]
    async fn memory_round_trip_through_tools() {
        let (dispatcher, _) = dispatcher();

        let add = dispatcher
            .dispatch(
                "memory_add",
                &json!({ "user_id": "u1", "key": "name", "value": "Ahmed" }),
            )
            .await;
        assert!(add.success);

        let get = dispatcher.dispatch("memory_get", &json!({ "user_id": "u1" })).await;
        assert!(get.success);
        let facts = get.result.expect("facts json");
        assert_eq!(facts[0]["key"], "name");
        assert_eq!(facts[0]["value"], "Ahmed");
    }

    #[tokio::test]
    async fn resolve_recipient_fails_then_succeeds_after_mapping() {
        let (dispatcher, facts) = dispatcher();

        let miss = dispatcher.dispatch("resolve_recipient", &json!({ "mention": "@sam" })).await;
        assert_failed(&miss, "no wallet on file for @sam");

        facts
            .store("owner", "wallet_sam", "0xaa00000000000000000000000000000000000001", 1.0)
            .await
            .expect("store mapping");

        let hit = dispatcher.dispatch("resolve_recipient", &json!({ "mention": "@sam" })).await;
        assert!(hit.success);
        let result = hit.result.expect("result");
        assert_eq!(result["address"], "0xaa00000000000000000000000000000000000001");
        assert_eq!(result["source"], "memory");
    }

    #[tokio::test]
    async fn resolve_recipient_falls_back_to_linked_identity() {
        let facts = Arc::new(InMemoryFactRepository::default());
        let identities = Arc::new(InMemoryIdentityRepository::default());
        identities
            .link(&LinkedIdentity {
                user_id: "u9".to_string(),
                handle: "sam".to_string(),
                wallet_address: "0xbb00000000000000000000000000000000000002".to_string(),
                linked_account_id: Some("acct-1".to_string()),
                created_at: Utc::now(),
            })
            .await
            .expect("link");

        let dispatcher = ToolDispatcher::new(
            facts,
            Arc::new(InMemoryKnowledgeRepository::default()),
            Arc::new(InMemoryTransferRepository::default()),
            identities,
            Arc::new(StaticFetcher { document: Err("offline") }),
        );

        let outcome = dispatcher.dispatch("resolve_recipient", &json!({ "mention": "@sam" })).await;
        assert!(outcome.success);
        assert_eq!(outcome.result.expect("result")["source"], "identity");
    }

    #[tokio::test]
    async fn knowledge_ask_without_citations_is_a_soft_failure() {
        let (dispatcher, _) = dispatcher();
        let outcome =
            dispatcher.dispatch("knowledge_ask", &json!({ "question": "what is base" })).await;
        assert_failed(&outcome, "no relevant citations");
    }

    #[tokio::test]
    async fn ingest_then_ask_cites_the_document() {
        let html = "<html><head><title>Base Docs</title></head><body>\
                    <p>Base is a low fee layer two network built on Ethereum.</p>\
                    </body></html>";
        let (dispatcher, _) = dispatcher_with_fetcher(StaticFetcher {
            document: Ok(FetchedDocument {
                text: html.to_string(),
                content_type: "text/html".to_string(),
                status: 200,
            }),
        });

        let ingest = dispatcher
            .dispatch("knowledge_ingest", &json!({ "url": "https://example.com/base" }))
            .await;
        assert!(ingest.success, "{:?}", ingest.error);
        assert_eq!(ingest.result.as_ref().expect("result")["duplicate"], false);

        // Same content again dedups instead of re-ingesting.
        let again = dispatcher
            .dispatch("knowledge_ingest", &json!({ "url": "https://example.com/base" }))
            .await;
        assert_eq!(again.result.expect("result")["duplicate"], true);

        let ask = dispatcher
            .dispatch("knowledge_ask", &json!({ "question": "what is the fee situation on base" }))
            .await;
        assert!(ask.success, "{:?}", ask.error);
        let result = ask.result.expect("result");
        assert!(result["answer"].as_str().expect("answer").contains("layer two"));
        assert_eq!(result["citations"][0]["title"], "Base Docs");
    }

    #[tokio::test]
    async fn fetch_failures_fold_into_the_envelope() {
        let (dispatcher, _) = dispatcher();
        let outcome = dispatcher
            .dispatch("knowledge_ingest", &json!({ "url": "https://example.com/x" }))
            .await;
        assert_failed(&outcome, "network error");
    }

    #[tokio::test]
    async fn recent_events_lists_executed_transfers_only() {
        use courier_core::domain::transfer::PendingTransfer;
        use courier_db::repositories::TransferRepository;
        use rust_decimal::Decimal;

        let transfers = Arc::new(InMemoryTransferRepository::default());
        let executed = PendingTransfer::draft("u1", "0xaa", "USDC", Decimal::ONE);
        transfers.create(&executed).await.expect("create");
        transfers.mark_executed(&executed.id, "0xhash").await.expect("execute");
        transfers
            .create(&PendingTransfer::draft("u1", "0xbb", "USDC", Decimal::TWO))
            .await
            .expect("create pending");

        let dispatcher = ToolDispatcher::new(
            Arc::new(InMemoryFactRepository::default()),
            Arc::new(InMemoryKnowledgeRepository::default()),
            transfers,
            Arc::new(InMemoryIdentityRepository::default()),
            Arc::new(StaticFetcher { document: Err("offline") }),
        );

        let outcome = dispatcher.dispatch("recent_events", &json!({ "limit": 5 })).await;
        assert!(outcome.success);
        let events = outcome.result.expect("events");
        assert_eq!(events.as_array().expect("array").len(), 1);
        assert_eq!(events[0]["tx_hash"], "0xhash");
    }
}
