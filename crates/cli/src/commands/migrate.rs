use courier_core::config::{AppConfig, LoadOptions};
use courier_db::{connect_with_settings, migrations};

use super::{block_on, CommandResult};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(err) => return CommandResult::failed(format!("config error: {err}")),
    };

    block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(err) => return CommandResult::failed(format!("database connect failed: {err}")),
        };

        match migrations::run_pending(&pool).await {
            Ok(()) => CommandResult::ok(format!(
                "migrations applied — database `{}` is current",
                config.database.url
            )),
            Err(err) => CommandResult::failed(format!("migration failed: {err}")),
        }
    })
}
