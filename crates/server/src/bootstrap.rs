use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use courier_agent::orchestrator::RepositoryHandles;
use courier_agent::tools::HttpDocumentFetcher;
use courier_agent::{DisabledExecutor, HttpCompletionBackend, Orchestrator};
use courier_core::config::{AppConfig, ConfigError, LoadOptions};
use courier_db::repositories::{
    SqlEpisodeRepository, SqlFactRepository, SqlIdentityRepository, SqlKnowledgeRepository,
    SqlRateLimitRepository, SqlSessionKeyRepository, SqlTransferRepository,
};
use courier_db::{connect_with_settings, migrations, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let handles = RepositoryHandles {
        facts: Arc::new(SqlFactRepository::new(db_pool.clone())),
        episodes: Arc::new(SqlEpisodeRepository::new(db_pool.clone())),
        knowledge: Arc::new(SqlKnowledgeRepository::new(db_pool.clone())),
        identities: Arc::new(SqlIdentityRepository::new(db_pool.clone())),
        sessions: Arc::new(SqlSessionKeyRepository::new(db_pool.clone())),
        transfers: Arc::new(SqlTransferRepository::new(db_pool.clone())),
        rate_limits: Arc::new(SqlRateLimitRepository::new(db_pool.clone())),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        handles,
        Arc::new(DisabledExecutor),
        Arc::new(HttpCompletionBackend::new()),
        Arc::new(HttpDocumentFetcher::new()),
    ));

    Ok(Application { config, db_pool, orchestrator })
}

#[cfg(test)]
mod tests {
    use courier_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                telegram_bot_token: Some("12345:test-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                telegram_bot_token: Some("not-a-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("expected config error").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_pipeline() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('user_facts', 'episodes', 'pending_transfers', 'session_keys')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should exist after bootstrap");
        assert_eq!(table_count, 4);

        let reply = app.orchestrator.handle_message("u1", "Sam", "hello").await;
        assert!(!reply.text().is_empty());

        app.db_pool.close().await;
    }
}
