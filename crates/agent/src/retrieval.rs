//! Retrieval engine: merges keyword-scored knowledge passages with
//! recency-boosted episodic log entries into one ranked list.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use courier_core::domain::memory::Episode;
use courier_core::normalize::{normalize_text, tokenize};
use courier_db::repositories::{
    EpisodeRepository, KnowledgeRepository, PassageHit, RepositoryError,
};

/// Per-token score when the token hits the document title.
const TITLE_TOKEN_SCORE: f64 = 10.0;
/// Per-token score when the token only hits the passage body.
const BODY_TOKEN_SCORE: f64 = 2.0;
/// Per-token score for episodic log hits.
const EPISODE_TOKEN_SCORE: f64 = 5.0;
/// Recency bonus decays linearly from this to zero over ten days.
const RECENCY_BONUS_MAX: f64 = 10.0;
/// Merged result cap.
const TOP_RESULTS: usize = 7;
/// How many recent episodes are scanned per query.
const EPISODE_SCAN_WINDOW: u32 = 50;

#[derive(Clone, Debug, PartialEq)]
pub enum RetrievalSource {
    Knowledge { title: String, source: String },
    Episode { ts: DateTime<Utc> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalHit {
    pub source: RetrievalSource,
    pub text: String,
    pub score: f64,
}

pub fn score_passage(tokens: &[String], title: &str, excerpt: &str) -> f64 {
    let title_normalized = normalize_text(title);
    let body_normalized = normalize_text(excerpt);

    tokens
        .iter()
        .map(|token| {
            if title_normalized.contains(token.as_str()) {
                TITLE_TOKEN_SCORE
            } else if body_normalized.contains(token.as_str()) {
                BODY_TOKEN_SCORE
            } else {
                0.0
            }
        })
        .sum()
}

pub fn score_episode(tokens: &[String], episode: &Episode, now: DateTime<Utc>) -> f64 {
    let haystack = normalize_text(&format!(
        "{} {} {}",
        episode.input_text,
        episode.intent.as_str(),
        episode.output_text
    ));

    let overlap = tokens.iter().filter(|token| haystack.contains(token.as_str())).count() as f64
        * EPISODE_TOKEN_SCORE;
    if overlap == 0.0 {
        return 0.0;
    }

    let days_ago = (now - episode.ts).num_seconds() as f64 / 86_400.0;
    overlap + (RECENCY_BONUS_MAX - days_ago).max(0.0)
}

pub struct RetrievalEngine {
    knowledge: Arc<dyn KnowledgeRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    confident_score: f64,
}

impl RetrievalEngine {
    pub fn new(
        knowledge: Arc<dyn KnowledgeRepository>,
        episodes: Arc<dyn EpisodeRepository>,
        confident_score: f64,
    ) -> Self {
        Self { knowledge, episodes, confident_score }
    }

    pub async fn retrieve(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<Vec<RetrievalHit>, RepositoryError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();

        let mut hits: Vec<RetrievalHit> = self
            .knowledge
            .candidates(&tokens)
            .await?
            .into_iter()
            .filter_map(|candidate| knowledge_hit(&tokens, candidate))
            .collect();

        for episode in self.episodes.recent(user_id, EPISODE_SCAN_WINDOW).await? {
            let score = score_episode(&tokens, &episode, now);
            if score > 0.0 {
                hits.push(RetrievalHit {
                    source: RetrievalSource::Episode { ts: episode.ts },
                    text: episode.input_text,
                    score,
                });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(TOP_RESULTS);
        Ok(hits)
    }

    /// Only hits above the confidence threshold may be used as a
    /// deterministic direct answer; weaker ones are context only.
    pub fn is_confident(&self, hit: &RetrievalHit) -> bool {
        hit.score > self.confident_score
    }
}

fn knowledge_hit(tokens: &[String], candidate: PassageHit) -> Option<RetrievalHit> {
    let score = score_passage(tokens, &candidate.title, &candidate.passage.excerpt);
    (score > 0.0).then(|| RetrievalHit {
        source: RetrievalSource::Knowledge { title: candidate.title, source: candidate.source },
        text: candidate.passage.excerpt,
        score,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use courier_core::domain::knowledge::{
        content_hash, split_passages, DocumentId, KnowledgeDocument,
    };
    use courier_core::domain::memory::Episode;
    use courier_core::nlu::{Entities, Intent};
    use courier_core::normalize::tokenize;
    use courier_db::repositories::{
        EpisodeRepository, InMemoryEpisodeRepository, InMemoryKnowledgeRepository,
        KnowledgeRepository,
    };

    use super::{score_episode, score_passage, RetrievalEngine, RetrievalSource};

    fn engine(
        knowledge: Arc<InMemoryKnowledgeRepository>,
        episodes: Arc<InMemoryEpisodeRepository>,
    ) -> RetrievalEngine {
        RetrievalEngine::new(knowledge, episodes, 20.0)
    }

    async fn ingest(repo: &InMemoryKnowledgeRepository, title: &str, content: &str) {
        let doc_id = DocumentId::generate();
        let document = KnowledgeDocument {
            id: doc_id.clone(),
            title: title.to_string(),
            source: "https://example.com".to_string(),
            content_hash: content_hash(content),
            created_at: Utc::now(),
        };
        repo.ingest(document, split_passages(&doc_id, content)).await.expect("ingest");
    }

    #[test]
    fn title_hits_outweigh_body_hits() {
        let tokens = tokenize("session keys");
        let title_score = score_passage(&tokens, "Session Keys", "unrelated body text entirely");
        let body_score =
            score_passage(&tokens, "Other Topic", "all about session keys and their expiry");
        assert_eq!(title_score, 20.0);
        assert_eq!(body_score, 4.0);
    }

    #[test]
    fn recent_episode_gets_recency_bonus() {
        let tokens = tokenize("gas fees");
        let mut fresh =
            Episode::new("u1", "what are gas fees", Intent::Unknown, Entities::default(), "…");
        fresh.ts = Utc::now();
        let mut stale = fresh.clone();
        stale.ts = Utc::now() - Duration::days(30);

        let fresh_score = score_episode(&tokens, &fresh, Utc::now());
        let stale_score = score_episode(&tokens, &stale, Utc::now());

        assert!(fresh_score > stale_score);
        // Both tokens hit, so the stale entry keeps the raw overlap
        // with a floored bonus.
        assert_eq!(stale_score, 10.0);
    }

    #[test]
    fn unrelated_episode_scores_zero_even_when_fresh() {
        let tokens = tokenize("gas fees");
        let episode =
            Episode::new("u1", "good morning", Intent::Greet, Entities::default(), "hello");
        assert_eq!(score_episode(&tokens, &episode, Utc::now()), 0.0);
    }

    #[tokio::test]
    async fn merge_ranks_knowledge_and_episodes_together() {
        let knowledge = Arc::new(InMemoryKnowledgeRepository::default());
        let episodes = Arc::new(InMemoryEpisodeRepository::default());

        ingest(
            &knowledge,
            "Session Keys Expiry",
            "Session keys are short lived credentials that expire after a day.",
        )
        .await;
        let episode = Episode::new(
            "u1",
            "tell me about session keys again",
            Intent::Unknown,
            Entities::default(),
            "they are short lived",
        );
        episodes.log(&episode, 50).await.expect("log");

        let engine = engine(knowledge, episodes);
        let hits = engine.retrieve("u1", "session keys expiry").await.expect("retrieve");

        assert_eq!(hits.len(), 2);
        // Three title hits (10 each) outrank two episode hits (5 each
        // plus the recency bonus).
        assert!(matches!(hits[0].source, RetrievalSource::Knowledge { .. }));
        assert!(engine.is_confident(&hits[0]));
        assert!(!engine.is_confident(&hits[1]));
    }

    #[tokio::test]
    async fn results_are_truncated_to_top_seven() {
        let knowledge = Arc::new(InMemoryKnowledgeRepository::default());
        let episodes = Arc::new(InMemoryEpisodeRepository::default());

        for i in 0..10 {
            let mut episode = Episode::new(
                "u1",
                format!("question about tokens number {i}"),
                Intent::Unknown,
                Entities::default(),
                "…",
            );
            episode.ts = Utc::now() - Duration::seconds(i);
            episodes.log(&episode, 50).await.expect("log");
        }

        let engine = engine(knowledge, episodes);
        let hits = engine.retrieve("u1", "tokens").await.expect("retrieve");
        assert_eq!(hits.len(), 7);
    }

    #[tokio::test]
    async fn empty_query_returns_nothing() {
        let knowledge = Arc::new(InMemoryKnowledgeRepository::default());
        let episodes = Arc::new(InMemoryEpisodeRepository::default());
        let engine = engine(knowledge, episodes);

        assert!(engine.retrieve("u1", "؟!").await.expect("retrieve").is_empty());
    }
}
