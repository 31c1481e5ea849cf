use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub providers: ProvidersConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
}

/// One ranked completion-service configuration in the fallback chain.
#[derive(Clone, Debug)]
pub struct ProviderTierConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct ProvidersConfig {
    pub enabled: bool,
    pub completion_daily_limit: u32,
    pub primary: ProviderTierConfig,
    pub fallback: ProviderTierConfig,
    pub fast: ProviderTierConfig,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub default_token: String,
    pub draft_daily_limit: u32,
    pub episode_retention: u32,
    pub self_check_similarity: f64,
    pub retrieval_confidence: f64,
    pub session_ttl_hours: i64,
    pub session_daily_cap: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub providers_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://courier.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
            },
            providers: ProvidersConfig {
                enabled: false,
                completion_daily_limit: 50,
                primary: ProviderTierConfig {
                    name: "groq".to_string(),
                    base_url: "https://api.groq.com/openai/v1".to_string(),
                    api_key: None,
                    model: "openai/gpt-oss-120b".to_string(),
                    timeout_secs: 12,
                    max_tokens: 900,
                },
                fallback: ProviderTierConfig {
                    name: "groq".to_string(),
                    base_url: "https://api.groq.com/openai/v1".to_string(),
                    api_key: None,
                    model: "llama-3.3-70b-versatile".to_string(),
                    timeout_secs: 12,
                    max_tokens: 900,
                },
                fast: ProviderTierConfig {
                    name: "groq".to_string(),
                    base_url: "https://api.groq.com/openai/v1".to_string(),
                    api_key: None,
                    model: "llama-3.1-8b-instant".to_string(),
                    timeout_secs: 12,
                    max_tokens: 500,
                },
            },
            agent: AgentConfig {
                default_token: "USDC".to_string(),
                draft_daily_limit: 5,
                episode_retention: 50,
                self_check_similarity: 0.5,
                retrieval_confidence: 20.0,
                session_ttl_hours: 24,
                session_daily_cap: "100 USDC".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("courier.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
        }

        if let Some(providers) = patch.providers {
            if let Some(enabled) = providers.enabled {
                self.providers.enabled = enabled;
            }
            if let Some(limit) = providers.completion_daily_limit {
                self.providers.completion_daily_limit = limit;
            }
            if let Some(tier) = providers.primary {
                apply_tier_patch(&mut self.providers.primary, tier);
            }
            if let Some(tier) = providers.fallback {
                apply_tier_patch(&mut self.providers.fallback, tier);
            }
            if let Some(tier) = providers.fast {
                apply_tier_patch(&mut self.providers.fast, tier);
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(default_token) = agent.default_token {
                self.agent.default_token = default_token;
            }
            if let Some(limit) = agent.draft_daily_limit {
                self.agent.draft_daily_limit = limit;
            }
            if let Some(retention) = agent.episode_retention {
                self.agent.episode_retention = retention;
            }
            if let Some(similarity) = agent.self_check_similarity {
                self.agent.self_check_similarity = similarity;
            }
            if let Some(confidence) = agent.retrieval_confidence {
                self.agent.retrieval_confidence = confidence;
            }
            if let Some(ttl) = agent.session_ttl_hours {
                self.agent.session_ttl_hours = ttl;
            }
            if let Some(cap) = agent.session_daily_cap {
                self.agent.session_daily_cap = cap;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.health_check_port {
                self.server.health_check_port = port;
            }
            if let Some(secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COURIER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COURIER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("COURIER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COURIER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("COURIER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COURIER_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("COURIER_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }

        if let Some(value) = read_env("COURIER_PROVIDERS_ENABLED") {
            self.providers.enabled = parse_bool("COURIER_PROVIDERS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("COURIER_PROVIDERS_COMPLETION_DAILY_LIMIT") {
            self.providers.completion_daily_limit =
                parse_u32("COURIER_PROVIDERS_COMPLETION_DAILY_LIMIT", &value)?;
        }
        apply_tier_env("COURIER_PROVIDER_PRIMARY", &mut self.providers.primary)?;
        apply_tier_env("COURIER_PROVIDER_FALLBACK", &mut self.providers.fallback)?;
        apply_tier_env("COURIER_PROVIDER_FAST", &mut self.providers.fast)?;

        if let Some(value) = read_env("COURIER_AGENT_DEFAULT_TOKEN") {
            self.agent.default_token = value;
        }
        if let Some(value) = read_env("COURIER_AGENT_DRAFT_DAILY_LIMIT") {
            self.agent.draft_daily_limit = parse_u32("COURIER_AGENT_DRAFT_DAILY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("COURIER_AGENT_EPISODE_RETENTION") {
            self.agent.episode_retention = parse_u32("COURIER_AGENT_EPISODE_RETENTION", &value)?;
        }
        if let Some(value) = read_env("COURIER_AGENT_SELF_CHECK_SIMILARITY") {
            self.agent.self_check_similarity =
                parse_f64("COURIER_AGENT_SELF_CHECK_SIMILARITY", &value)?;
        }
        if let Some(value) = read_env("COURIER_AGENT_RETRIEVAL_CONFIDENCE") {
            self.agent.retrieval_confidence =
                parse_f64("COURIER_AGENT_RETRIEVAL_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("COURIER_AGENT_SESSION_TTL_HOURS") {
            self.agent.session_ttl_hours =
                parse_u32("COURIER_AGENT_SESSION_TTL_HOURS", &value)? as i64;
        }

        if let Some(value) = read_env("COURIER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("COURIER_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("COURIER_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("COURIER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("COURIER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("COURIER_LOGGING_LEVEL").or_else(|| read_env("COURIER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COURIER_LOGGING_FORMAT").or_else(|| read_env("COURIER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(enabled) = overrides.providers_enabled {
            self.providers.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_tier("providers.primary", &self.providers.primary)?;
        validate_tier("providers.fallback", &self.providers.fallback)?;
        validate_tier("providers.fast", &self.providers.fast)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn apply_tier_patch(tier: &mut ProviderTierConfig, patch: ProviderTierPatch) {
    if let Some(name) = patch.name {
        tier.name = name;
    }
    if let Some(base_url) = patch.base_url {
        tier.base_url = base_url;
    }
    if let Some(api_key_value) = patch.api_key {
        tier.api_key = Some(secret_value(api_key_value));
    }
    if let Some(model) = patch.model {
        tier.model = model;
    }
    if let Some(timeout_secs) = patch.timeout_secs {
        tier.timeout_secs = timeout_secs;
    }
    if let Some(max_tokens) = patch.max_tokens {
        tier.max_tokens = max_tokens;
    }
}

fn apply_tier_env(prefix: &str, tier: &mut ProviderTierConfig) -> Result<(), ConfigError> {
    if let Some(value) = read_env(&format!("{prefix}_NAME")) {
        tier.name = value;
    }
    if let Some(value) = read_env(&format!("{prefix}_BASE_URL")) {
        tier.base_url = value;
    }
    if let Some(value) = read_env(&format!("{prefix}_API_KEY")) {
        tier.api_key = Some(secret_value(value));
    }
    if let Some(value) = read_env(&format!("{prefix}_MODEL")) {
        tier.model = value;
    }
    if let Some(value) = read_env(&format!("{prefix}_TIMEOUT_SECS")) {
        tier.timeout_secs = parse_u64(&format!("{prefix}_TIMEOUT_SECS"), &value)?;
    }
    if let Some(value) = read_env(&format!("{prefix}_MAX_TOKENS")) {
        tier.max_tokens = parse_u32(&format!("{prefix}_MAX_TOKENS"), &value)?;
    }
    Ok(())
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("courier.toml"), PathBuf::from("config/courier.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let token = telegram.bot_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather".to_string(),
        ));
    }
    if !token.contains(':') {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot_id>:<secret>` (from @BotFather)".to_string(),
        ));
    }
    if !telegram.api_base_url.starts_with("http://")
        && !telegram.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_tier(section: &str, tier: &ProviderTierConfig) -> Result<(), ConfigError> {
    if tier.timeout_secs == 0 || tier.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "{section}.timeout_secs must be in range 1..=300"
        )));
    }
    if tier.max_tokens == 0 {
        return Err(ConfigError::Validation(format!(
            "{section}.max_tokens must be greater than zero"
        )));
    }
    if tier.model.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{section}.model must not be empty")));
    }
    if !tier.base_url.starts_with("http://") && !tier.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{section}.base_url must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.default_token.trim().is_empty() {
        return Err(ConfigError::Validation("agent.default_token must not be empty".to_string()));
    }
    if agent.draft_daily_limit == 0 {
        return Err(ConfigError::Validation(
            "agent.draft_daily_limit must be greater than zero".to_string(),
        ));
    }
    if agent.episode_retention == 0 {
        return Err(ConfigError::Validation(
            "agent.episode_retention must be greater than zero".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&agent.self_check_similarity) {
        return Err(ConfigError::Validation(
            "agent.self_check_similarity must be in range 0.0..=1.0".to_string(),
        ));
    }
    if agent.retrieval_confidence < 0.0 {
        return Err(ConfigError::Validation(
            "agent.retrieval_confidence must not be negative".to_string(),
        ));
    }
    if agent.session_ttl_hours <= 0 {
        return Err(ConfigError::Validation(
            "agent.session_ttl_hours must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }
    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    providers: Option<ProvidersPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProvidersPatch {
    enabled: Option<bool>,
    completion_daily_limit: Option<u32>,
    primary: Option<ProviderTierPatch>,
    fallback: Option<ProviderTierPatch>,
    fast: Option<ProviderTierPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderTierPatch {
    name: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    default_token: Option<String>,
    draft_daily_limit: Option<u32>,
    episode_retention: Option<u32>,
    self_check_similarity: Option<f64>,
    retrieval_confidence: Option<f64>,
    session_ttl_hours: Option<i64>,
    session_daily_cap: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_COURIER_BOT_TOKEN", "12345:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("courier.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_COURIER_BOT_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "12345:from-env",
                "bot token should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_COURIER_BOT_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COURIER_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("COURIER_TELEGRAM_BOT_TOKEN", "12345:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("courier.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[telegram]
bot_token = "12345:from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.telegram.bot_token.expose_secret() == "12345:from-env",
                "env bot token should win over file and defaults",
            )
        })();

        clear_vars(&["COURIER_DATABASE_URL", "COURIER_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn tier_env_overrides_apply_per_tier() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COURIER_TELEGRAM_BOT_TOKEN", "12345:token");
        env::set_var("COURIER_PROVIDER_FAST_MODEL", "tiny-model");
        env::set_var("COURIER_PROVIDER_FAST_MAX_TOKENS", "256");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.providers.fast.model == "tiny-model", "fast model from env")?;
            ensure(config.providers.fast.max_tokens == 256, "fast max tokens from env")?;
            ensure(
                config.providers.primary.model == "openai/gpt-oss-120b",
                "primary model untouched",
            )
        })();

        clear_vars(&[
            "COURIER_TELEGRAM_BOT_TOKEN",
            "COURIER_PROVIDER_FAST_MODEL",
            "COURIER_PROVIDER_FAST_MAX_TOKENS",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COURIER_TELEGRAM_BOT_TOKEN", "missing-colon");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(&["COURIER_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COURIER_TELEGRAM_BOT_TOKEN", "12345:secret-value");
        env::set_var("COURIER_PROVIDER_PRIMARY_API_KEY", "gsk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("secret-value"), "debug output should not contain secrets")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&["COURIER_TELEGRAM_BOT_TOKEN", "COURIER_PROVIDER_PRIMARY_API_KEY"]);
        result
    }
}
