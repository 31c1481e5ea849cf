use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::memory::{Episode, EpisodeId};
use courier_core::nlu::{Entities, Intent};

use super::facts::parse_timestamp;
use super::{EpisodeRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEpisodeRepository {
    pool: DbPool,
}

impl SqlEpisodeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EpisodeRepository for SqlEpisodeRepository {
    async fn log(&self, episode: &Episode, retention: u32) -> Result<(), RepositoryError> {
        let entities_json = serde_json::to_string(&episode.entities)
            .map_err(|err| RepositoryError::Decode(format!("entities encode failed: {err}")))?;

        // Insert and prune together: both happen or neither, so the
        // log cannot silently grow past the retention window.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO episodes (id, user_id, ts, input_text, intent, entities_json, output_text)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&episode.id.0)
        .bind(&episode.user_id)
        .bind(episode.ts.to_rfc3339())
        .bind(&episode.input_text)
        .bind(episode.intent.as_str())
        .bind(&entities_json)
        .bind(&episode.output_text)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM episodes
             WHERE user_id = ?
               AND id NOT IN (
                   SELECT id FROM episodes
                   WHERE user_id = ?
                   ORDER BY ts DESC, id DESC
                   LIMIT ?
               )",
        )
        .bind(&episode.user_id)
        .bind(&episode.user_id)
        .bind(i64::from(retention))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: u32) -> Result<Vec<Episode>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, ts, input_text, intent, entities_json, output_text
             FROM episodes
             WHERE user_id = ?
             ORDER BY ts DESC, id DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(episode_from_row).collect()
    }
}

fn episode_from_row(row: SqliteRow) -> Result<Episode, RepositoryError> {
    let intent_raw = row.get::<String, _>("intent");
    let intent = Intent::parse(&intent_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown intent `{intent_raw}`")))?;

    let entities_raw = row.get::<String, _>("entities_json");
    let entities: Entities = serde_json::from_str(&entities_raw)
        .map_err(|err| RepositoryError::Decode(format!("entities decode failed: {err}")))?;

    Ok(Episode {
        id: EpisodeId(row.get::<String, _>("id")),
        user_id: row.get::<String, _>("user_id"),
        ts: parse_timestamp(&row.get::<String, _>("ts"))?,
        input_text: row.get::<String, _>("input_text"),
        intent,
        entities,
        output_text: row.get::<String, _>("output_text"),
    })
}
