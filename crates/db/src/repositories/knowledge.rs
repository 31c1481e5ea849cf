use std::collections::HashMap;

use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::knowledge::{DocumentId, KnowledgeDocument, Passage, PassageId};
use courier_core::normalize::tokenize;

use super::facts::parse_timestamp;
use super::{IngestOutcome, KnowledgeRepository, PassageHit, RepositoryError};
use crate::DbPool;

pub struct SqlKnowledgeRepository {
    pool: DbPool,
}

impl SqlKnowledgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl KnowledgeRepository for SqlKnowledgeRepository {
    async fn ingest(
        &self,
        document: KnowledgeDocument,
        passages: Vec<Passage>,
    ) -> Result<IngestOutcome, RepositoryError> {
        let existing = sqlx::query(
            "SELECT id FROM knowledge_documents WHERE content_hash = ?",
        )
        .bind(&document.content_hash)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            return Ok(IngestOutcome::Duplicate(DocumentId(row.get::<String, _>("id"))));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO knowledge_documents (id, title, source, content_hash, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&document.id.0)
        .bind(&document.title)
        .bind(&document.source)
        .bind(&document.content_hash)
        .bind(document.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for passage in &passages {
            sqlx::query(
                "INSERT INTO knowledge_passages (id, document_id, idx, excerpt)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&passage.id.0)
            .bind(&passage.document_id.0)
            .bind(i64::from(passage.idx))
            .bind(&passage.excerpt)
            .execute(&mut *tx)
            .await?;

            let mut term_frequencies: HashMap<String, u32> = HashMap::new();
            for token in tokenize(&passage.excerpt) {
                *term_frequencies.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in term_frequencies {
                sqlx::query(
                    "INSERT INTO knowledge_terms (term, passage_id, tf) VALUES (?, ?, ?)",
                )
                .bind(&term)
                .bind(&passage.id.0)
                .bind(i64::from(tf))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(IngestOutcome::Created(document.id))
    }

    async fn candidates(&self, tokens: &[String]) -> Result<Vec<PassageHit>, RepositoryError> {
        let mut hits: Vec<PassageHit> = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

        for token in tokens {
            let rows = sqlx::query(
                "SELECT p.id, p.document_id, p.idx, p.excerpt, d.title, d.source
                 FROM knowledge_terms t
                 JOIN knowledge_passages p ON t.passage_id = p.id
                 JOIN knowledge_documents d ON p.document_id = d.id
                 WHERE t.term = ?",
            )
            .bind(token)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                let passage_id = row.get::<String, _>("id");
                if seen.insert(passage_id) {
                    hits.push(hit_from_row(row));
                }
            }
        }

        Ok(hits)
    }

    async fn documents(&self) -> Result<Vec<KnowledgeDocument>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, source, content_hash, created_at
             FROM knowledge_documents
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(document_from_row).collect()
    }
}

fn hit_from_row(row: SqliteRow) -> PassageHit {
    PassageHit {
        passage: Passage {
            id: PassageId(row.get::<String, _>("id")),
            document_id: DocumentId(row.get::<String, _>("document_id")),
            idx: row.get::<i64, _>("idx") as u32,
            excerpt: row.get::<String, _>("excerpt"),
        },
        title: row.get::<String, _>("title"),
        source: row.get::<String, _>("source"),
    }
}

fn document_from_row(row: SqliteRow) -> Result<KnowledgeDocument, RepositoryError> {
    Ok(KnowledgeDocument {
        id: DocumentId(row.get::<String, _>("id")),
        title: row.get::<String, _>("title"),
        source: row.get::<String, _>("source"),
        content_hash: row.get::<String, _>("content_hash"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
