//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::fetch::{FetcherConfig, PaginationPolicy};

/// Public API root of the Online Go Server.
pub const DEFAULT_UPSTREAM_URL: &str = "https://online-go.com/api/v1";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed browser origins; `"*"` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest page the upstream will serve
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Pause before retrying a failed page
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Wall-clock budget for collecting one player's history
    #[serde(default = "default_fetch_budget")]
    pub fetch_budget_seconds: u64,
}

fn default_base_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("go-stats/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_page_size() -> u32 {
    100
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_fetch_budget() -> u64 {
    25
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            max_page_size: default_max_page_size(),
            retry_delay_ms: default_retry_delay(),
            fetch_budget_seconds: default_fetch_budget(),
        }
    }
}

/// Request limits and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_games")]
    pub default_max_games: usize,

    /// Hard ceiling on `maxGames`
    #[serde(default = "default_max_games_cap")]
    pub max_games_cap: usize,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Top-K for fuzzy candidate lists
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_ordering")]
    pub default_ordering: String,
}

fn default_max_games() -> usize {
    1000
}

fn default_max_games_cap() -> usize {
    10_000
}

fn default_page_size() -> u32 {
    100
}

fn default_max_candidates() -> usize {
    10
}

fn default_ordering() -> String {
    "-ended".to_string()
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_max_games: default_max_games(),
            max_games_cap: default_max_games_cap(),
            default_page_size: default_page_size(),
            max_candidates: default_max_candidates(),
            default_ordering: default_ordering(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::from_file`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.upstream.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream timeout must be greater than 0".to_string(),
            ));
        }

        if self.upstream.max_page_size == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream max_page_size must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_games_cap == 0 {
            return Err(ConfigError::ValidationError(
                "max_games_cap must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_candidates == 0 {
            return Err(ConfigError::ValidationError(
                "max_candidates must be greater than 0".to_string(),
            ));
        }

        self.upstream_url()?;
        Ok(())
    }

    pub fn upstream_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.upstream.base_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid upstream base_url {:?}: {}",
                self.upstream.base_url, e
            ))
        })
    }

    pub fn fetcher_config(&self) -> Result<FetcherConfig, ConfigError> {
        Ok(FetcherConfig {
            base_url: self.upstream_url()?,
            timeout: Duration::from_secs(self.upstream.timeout_seconds),
            user_agent: self.upstream.user_agent.clone(),
        })
    }

    pub fn pagination_policy(&self) -> PaginationPolicy {
        PaginationPolicy {
            budget: Duration::from_secs(self.upstream.fetch_budget_seconds),
            retry_delay: Duration::from_millis(self.upstream.retry_delay_ms),
        }
    }

    /// Clamp a requested page size to what the upstream allows.
    pub fn clamp_page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.limits.default_page_size)
            .clamp(1, self.upstream.max_page_size)
    }

    /// Clamp a requested game count to the configured ceiling.
    pub fn clamp_max_games(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.limits.default_max_games)
            .clamp(1, self.limits.max_games_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.upstream.base_url, "https://online-go.com/api/v1");
        assert_eq!(config.upstream.max_page_size, 100);
        assert_eq!(config.upstream.fetch_budget_seconds, 25);
        assert_eq!(config.limits.max_games_cap, 10_000);
        assert_eq!(config.limits.max_candidates, 10);
        assert_eq!(config.limits.default_ordering, "-ended");
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_timeout() {
        let mut config = AppConfig::default();
        config.upstream.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_url() {
        let mut config = AppConfig::default();
        config.upstream.base_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_validation_zero_limits() {
        let mut config = AppConfig::default();
        config.limits.max_candidates = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upstream.max_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[server]
port = 8080
cors_origins = ["http://localhost:8000", "https://badukalpha.github.io"]

[upstream]
retry_delay_ms = 250
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.cors_origins.len(), 2);
        assert_eq!(config.upstream.retry_delay_ms, 250);
        assert_eq!(config.upstream.timeout_seconds, 10);
        assert_eq!(config.limits.max_games_cap, 10_000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 0").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::ValidationError(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.upstream.base_url, parsed.upstream.base_url);
        assert_eq!(config.server.cors_origins, parsed.server.cors_origins);
    }

    #[test]
    fn test_clamping() {
        let config = AppConfig::default();

        assert_eq!(config.clamp_page_size(None), 100);
        assert_eq!(config.clamp_page_size(Some(500)), 100);
        assert_eq!(config.clamp_page_size(Some(0)), 1);
        assert_eq!(config.clamp_page_size(Some(25)), 25);

        assert_eq!(config.clamp_max_games(None), 1000);
        assert_eq!(config.clamp_max_games(Some(50_000)), 10_000);
        assert_eq!(config.clamp_max_games(Some(0)), 1);
        assert_eq!(config.clamp_max_games(Some(250)), 250);
    }

    #[test]
    fn test_derived_settings() {
        let config = AppConfig::default();
        let fetcher = config.fetcher_config().unwrap();
        assert_eq!(fetcher.timeout, Duration::from_secs(10));

        let policy = config.pagination_policy();
        assert_eq!(policy.budget, Duration::from_secs(25));
        assert_eq!(policy.retry_delay, Duration::from_millis(1000));
    }
}
