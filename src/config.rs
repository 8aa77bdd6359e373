use std::{env, path::PathBuf, time::Duration};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/health.db?mode=rwc";
pub const DEFAULT_AI_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_AI_MODEL: &str = "deepseek-chat";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OUTBOX_DIR: &str = "data/outbox";
pub const DEFAULT_FROM_EMAIL: &str = "reports@localhost";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// `None` when no API key is configured.
    pub ai: Option<AiSettings>,
    pub outbox_dir: PathBuf,
    pub from_email: String,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => parse_number("PORT", &value)?,
            None => DEFAULT_PORT,
        };

        let ai = match var("DEEPSEEK_API_KEY") {
            Some(api_key) => {
                let timeout_secs = match var("AI_TIMEOUT_SECS") {
                    Some(value) => parse_number("AI_TIMEOUT_SECS", &value)?,
                    None => DEFAULT_AI_TIMEOUT_SECS,
                };
                Some(AiSettings {
                    api_key,
                    base_url: var("AI_BASE_URL").unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string()),
                    model: var("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            None => None,
        };

        Ok(Self {
            port,
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            ai,
            outbox_dir: var("REPORT_OUTBOX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTBOX_DIR)),
            from_email: var("REPORT_FROM_EMAIL").unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.ai.is_none());
        assert_eq!(config.outbox_dir, PathBuf::from(DEFAULT_OUTBOX_DIR));
    }

    #[test]
    fn api_key_enables_ai_with_overrides() {
        let config = config_from(&[
            ("DEEPSEEK_API_KEY", "secret"),
            ("AI_BASE_URL", "http://127.0.0.1:9999"),
            ("AI_TIMEOUT_SECS", "5"),
            ("PORT", "3000"),
        ])
        .unwrap();

        let ai = config.ai.expect("ai settings");
        assert_eq!(ai.base_url, "http://127.0.0.1:9999");
        assert_eq!(ai.model, DEFAULT_AI_MODEL);
        assert_eq!(ai.timeout, Duration::from_secs(5));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn blank_key_counts_as_missing_and_bad_port_is_rejected() {
        assert!(config_from(&[("DEEPSEEK_API_KEY", "  ")]).unwrap().ai.is_none());
        assert!(matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidNumber { name: "PORT", .. })
        ));
    }
}
