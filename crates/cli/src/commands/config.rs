use secrecy::ExposeSecret;

use courier_core::config::{AppConfig, LoadOptions, ProviderTierConfig};

use super::CommandResult;

fn redact(secret: &secrecy::SecretString) -> &'static str {
    if secret.expose_secret().is_empty() {
        "(unset)"
    } else {
        "(redacted)"
    }
}

fn tier_line(label: &str, tier: &ProviderTierConfig) -> String {
    let key = match &tier.api_key {
        Some(_) => "(redacted)",
        None => "(unset)",
    };
    format!(
        "  {label}: {} model={} timeout={}s max_tokens={} api_key={key}",
        tier.name, tier.model, tier.timeout_secs, tier.max_tokens
    )
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(err) => return CommandResult::failed(format!("config error: {err}")),
    };

    let output = format!(
        "effective configuration:\n\
         database:\n  url: {}\n  max_connections: {}\n  timeout_secs: {}\n\
         telegram:\n  bot_token: {}\n  api_base_url: {}\n\
         providers (enabled: {}, completion_daily_limit: {}):\n{}\n{}\n{}\n\
         agent:\n  default_token: {}\n  draft_daily_limit: {}\n  episode_retention: {}\n  \
         self_check_similarity: {}\n  retrieval_confidence: {}\n  session_ttl_hours: {}\n\
         server:\n  bind_address: {}\n  health_check_port: {}\n\
         logging:\n  level: {}",
        config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
        redact(&config.telegram.bot_token),
        config.telegram.api_base_url,
        config.providers.enabled,
        config.providers.completion_daily_limit,
        tier_line("primary", &config.providers.primary),
        tier_line("fallback", &config.providers.fallback),
        tier_line("fast", &config.providers.fast),
        config.agent.default_token,
        config.agent.draft_daily_limit,
        config.agent.episode_retention,
        config.agent.self_check_similarity,
        config.agent.retrieval_confidence,
        config.agent.session_ttl_hours,
        config.server.bind_address,
        config.server.health_check_port,
        config.logging.level,
    );

    CommandResult::ok(output)
}
