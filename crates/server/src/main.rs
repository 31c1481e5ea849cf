mod bootstrap;
mod health;
mod transport;

use anyhow::Result;
use courier_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use courier_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let runner = transport::LongPollRunner::new(
        app.config.telegram.api_base_url.clone(),
        app.config.telegram.bot_token.clone(),
        app.orchestrator.clone(),
    );

    tracing::info!(event_name = "system.server.started", "courier-server started");

    tokio::select! {
        _ = runner.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(event_name = "system.server.stopping", "courier-server stopping");
        }
    }

    Ok(())
}
