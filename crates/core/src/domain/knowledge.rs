use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassageId(pub String);

impl PassageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// An ingested document. Immutable once stored; `content_hash` dedups
/// re-ingestion of identical text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: DocumentId,
    pub title: String,
    pub source: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub document_id: DocumentId,
    pub idx: u32,
    pub excerpt: String,
}

/// SHA-256 of the extracted text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Split extracted text into indexable passages: paragraph chunks,
/// capped at 300 characters, paragraphs under 20 characters dropped.
pub fn split_passages(document_id: &DocumentId, content: &str) -> Vec<Passage> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| paragraph.chars().count() > 20)
        .enumerate()
        .map(|(idx, paragraph)| Passage {
            id: PassageId::generate(),
            document_id: document_id.clone(),
            idx: idx as u32,
            excerpt: paragraph.chars().take(300).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{content_hash, split_passages, DocumentId};

    #[test]
    fn content_hash_is_stable_and_hex() {
        let a = content_hash("hello world");
        let b = content_hash("hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_content_hashes_differ() {
        assert_ne!(content_hash("alpha"), content_hash("beta"));
    }

    #[test]
    fn split_passages_chunks_paragraphs_and_drops_stubs() {
        let doc = DocumentId::generate();
        let content = format!(
            "{}\n\nshort\n\n{}",
            "This opening paragraph easily clears the length floor.",
            "x".repeat(400)
        );
        let passages = split_passages(&doc, &content);
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].idx, 0);
        assert_eq!(passages[1].idx, 1);
        assert_eq!(passages[1].excerpt.chars().count(), 300);
    }
}
