use serde_json::json;

use courier_core::config::{AppConfig, LoadOptions};
use courier_db::{connect_with_settings, migrations};

use super::{block_on, CommandResult};

struct Check {
    name: &'static str,
    passed: bool,
    detail: String,
}

pub fn run(as_json: bool) -> CommandResult {
    let mut checks: Vec<Check> = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(Check {
                name: "config",
                passed: true,
                detail: "loaded and validated".to_string(),
            });
            Some(config)
        }
        Err(err) => {
            checks.push(Check { name: "config", passed: false, detail: err.to_string() });
            None
        }
    };

    if let Some(config) = &config {
        block_on(async {
            match connect_with_settings(
                &config.database.url,
                config.database.max_connections,
                config.database.timeout_secs,
            )
            .await
            {
                Ok(pool) => {
                    checks.push(Check {
                        name: "database",
                        passed: true,
                        detail: format!("connected to `{}`", config.database.url),
                    });
                    match migrations::run_pending(&pool).await {
                        Ok(()) => checks.push(Check {
                            name: "migrations",
                            passed: true,
                            detail: "schema is current".to_string(),
                        }),
                        Err(err) => checks.push(Check {
                            name: "migrations",
                            passed: false,
                            detail: err.to_string(),
                        }),
                    }
                }
                Err(err) => {
                    checks.push(Check {
                        name: "database",
                        passed: false,
                        detail: err.to_string(),
                    });
                }
            }
        });
    }

    let all_passed = checks.iter().all(|check| check.passed);

    let output = if as_json {
        json!({
            "status": if all_passed { "ok" } else { "failed" },
            "checks": checks
                .iter()
                .map(|check| {
                    json!({ "name": check.name, "passed": check.passed, "detail": check.detail })
                })
                .collect::<Vec<_>>(),
        })
        .to_string()
    } else {
        let lines: Vec<String> = checks
            .iter()
            .map(|check| {
                format!(
                    "[{}] {} — {}",
                    if check.passed { "ok" } else { "FAIL" },
                    check.name,
                    check.detail
                )
            })
            .collect();
        lines.join("\n")
    };

    if all_passed {
        CommandResult::ok(output)
    } else {
        CommandResult::failed(output)
    }
}
