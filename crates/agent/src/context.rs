//! Context packaging for provider calls: a compact digest of stored
//! facts, recent conversation, and retrieval hits.

use courier_core::domain::memory::{Episode, MemoryFact};

use crate::retrieval::RetrievalHit;

pub const SYSTEM_PROMPT: &str = "\
You are Courier, a careful conversational assistant that helps one user \
manage small token transfers on the Base network and remembers what they \
teach you.\n\
Rules:\n\
- Be concise and concrete; never repeat yourself.\n\
- Use the provided FACTS and KNOWLEDGE when they answer the question, and \
say so plainly.\n\
- You never move funds yourself: transfers are drafted, confirmed by the \
user, and executed elsewhere.\n\
- If you do not know, say you do not know.";

const FACT_LIMIT: usize = 5;
const HISTORY_LIMIT: usize = 3;
const KNOWLEDGE_LIMIT: usize = 2;
const KNOWLEDGE_EXCERPT_CHARS: usize = 200;

/// Build the CONTEXT block sent alongside the user message. Sections
/// are omitted when empty, so a brand-new user produces no filler.
pub fn package_context(facts: &[MemoryFact], episodes: &[Episode], hits: &[RetrievalHit]) -> String {
    let mut sections: Vec<String> = Vec::new();

    if !facts.is_empty() {
        let lines: Vec<String> = facts
            .iter()
            .take(FACT_LIMIT)
            .map(|fact| format!("- {}: {}", fact.key, fact.value))
            .collect();
        sections.push(format!("USER FACTS:\n{}", lines.join("\n")));
    }

    if !episodes.is_empty() {
        // Oldest first, so the model reads the conversation forward.
        let lines: Vec<String> = episodes
            .iter()
            .take(HISTORY_LIMIT)
            .rev()
            .map(|episode| format!("- {}", episode.input_text))
            .collect();
        sections.push(format!("RECENT MESSAGES:\n{}", lines.join("\n")));
    }

    if !hits.is_empty() {
        let lines: Vec<String> = hits
            .iter()
            .take(KNOWLEDGE_LIMIT)
            .map(|hit| {
                let excerpt: String = hit.text.chars().take(KNOWLEDGE_EXCERPT_CHARS).collect();
                format!("- {excerpt}")
            })
            .collect();
        sections.push(format!("KNOWLEDGE:\n{}", lines.join("\n")));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use courier_core::domain::memory::{Episode, MemoryFact};
    use courier_core::nlu::{Entities, Intent};

    use crate::retrieval::{RetrievalHit, RetrievalSource};

    use super::package_context;

    fn fact(key: &str, value: &str) -> MemoryFact {
        MemoryFact {
            user_id: "u1".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            confidence: 1.0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_inputs_produce_empty_context() {
        assert_eq!(package_context(&[], &[], &[]), "");
    }

    #[test]
    fn sections_are_labelled_and_bounded() {
        let facts: Vec<MemoryFact> =
            (0..8).map(|i| fact(&format!("k{i}"), &format!("v{i}"))).collect();
        let episodes: Vec<Episode> = (0..5)
            .map(|i| {
                Episode::new("u1", format!("msg {i}"), Intent::Unknown, Entities::default(), "out")
            })
            .collect();
        let hits = vec![RetrievalHit {
            source: RetrievalSource::Episode { ts: Utc::now() },
            text: "x".repeat(500),
            score: 12.0,
        }];

        let context = package_context(&facts, &episodes, &hits);

        assert!(context.contains("USER FACTS:"));
        assert!(context.contains("RECENT MESSAGES:"));
        assert!(context.contains("KNOWLEDGE:"));
        assert_eq!(context.matches("- k").count(), 5);
        assert_eq!(context.matches("- msg").count(), 3);
        // Long excerpts are truncated.
        assert!(!context.contains(&"x".repeat(201)));
    }

    #[test]
    fn history_reads_oldest_first() {
        let episodes: Vec<Episode> = (0..3)
            .map(|i| {
                Episode::new("u1", format!("msg {i}"), Intent::Unknown, Entities::default(), "out")
            })
            .collect();
        // `episodes` arrives newest-first from the repository.
        let context = package_context(&[], &episodes, &[]);
        let first = context.find("msg 2").expect("oldest of the window");
        let last = context.find("msg 0").expect("newest");
        assert!(first < last);
    }
}
