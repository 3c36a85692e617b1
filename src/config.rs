//! Layered configuration for RedditLink
//!
//! Settings are resolved with the following priority (lowest to highest):
//! 1. Default values (embedded in structs)
//! 2. TOML file (default: `redditlink.toml`, override with `REDDITLINK_CONFIG`)
//! 3. `.env` file (via dotenvy)
//! 4. Environment variables `REDDITLINK__<section>__<key>`
//!
//! Examples:
//! - `REDDITLINK__SERVER__BASE_URL=http://192.168.1.20:8000`
//! - `REDDITLINK__SERVER__PROBE_TIMEOUT_MS=5000`

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use config::{Environment, File};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const CONFIG_ENV_VAR: &str = "REDDITLINK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "redditlink.toml";
const ENV_PREFIX: &str = "REDDITLINK";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid server base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub quality: QualityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Origin of the job server, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    /// Hard timeout for the liveness probe
    pub probe_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            probe_timeout_ms: 2000,
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::BaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {other:?}"),
            }),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Domains a resource URL must be hosted on, directly or on a subdomain
    pub supported_domains: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            supported_domains: [
                "reddit.com",
                "redd.it",
                "youtube.com",
                "youtu.be",
                "twitter.com",
                "x.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// One entry of the quality pick list. `value` is sent to the server as-is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QualityOption {
    pub value: String,
    pub label: String,
}

impl QualityOption {
    fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

impl fmt::Display for QualityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub default: String,
    pub options: Vec<QualityOption>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            default: "best".to_string(),
            options: vec![
                QualityOption::new("best", "Best available"),
                QualityOption::new("1080p", "1080p"),
                QualityOption::new("720p", "720p"),
                QualityOption::new("480p", "480p"),
                QualityOption::new("audio", "Audio only (MP3)"),
            ],
        }
    }
}

impl QualityConfig {
    pub fn find(&self, value: &str) -> Option<&QualityOption> {
        self.options.iter().find(|option| option.value == value)
    }

    pub fn default_option(&self) -> Option<&QualityOption> {
        self.find(&self.default)
    }
}

impl AppConfig {
    /// Load configuration from all sources and validate it
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file doesn't exist)
        let _ = dotenvy::dotenv();

        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let config = Self::load_from_sources(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path and the environment, without validation
    pub fn load_from_sources(config_path: PathBuf) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if config_path.exists() {
            tracing::info!("Loading configuration from: {}", config_path.display());
            builder = builder.add_source(File::from(config_path).required(false));
        } else {
            tracing::debug!(
                "Configuration file not found at {}, using defaults and environment overrides",
                config_path.display()
            );
        }

        // REDDITLINK__SERVER__BASE_URL -> server.base_url
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.base_url()?;

        if self.server.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "server.probe_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self
            .sources
            .supported_domains
            .iter()
            .all(|domain| domain.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "sources.supported_domains must list at least one domain".to_string(),
            ));
        }

        if self.quality.options.is_empty() {
            return Err(ConfigError::Validation(
                "quality.options must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for option in &self.quality.options {
            if !seen.insert(option.value.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate quality option {:?}",
                    option.value
                )));
            }
        }

        if self.quality.default_option().is_none() {
            return Err(ConfigError::Validation(format!(
                "default quality {:?} is not one of the configured options",
                self.quality.default
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.base_url().unwrap().as_str(), "http://127.0.0.1:8000/");
        assert_eq!(config.server.probe_timeout(), Duration::from_millis(2000));
        assert_eq!(config.quality.default_option().unwrap().value, "best");
    }

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from_sources(config_path).unwrap();
        assert_eq!(config.sources.supported_domains.len(), 6);
        assert_eq!(config.quality.options.len(), 5);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("redditlink.toml");

        let toml_content = r#"
[server]
base_url = "http://10.0.0.5:9000"
probe_timeout_ms = 500

[sources]
supported_domains = ["vimeo.com"]

[quality]
default = "720p"
options = [
    { value = "720p", label = "HD" },
    { value = "audio", label = "Audio" },
]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = AppConfig::load_from_sources(config_path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.base_url().unwrap().port(), Some(9000));
        assert_eq!(config.server.probe_timeout(), Duration::from_millis(500));
        assert_eq!(config.sources.supported_domains, vec!["vimeo.com".to_string()]);
        assert_eq!(config.quality.default_option().unwrap().label, "HD");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = AppConfig::default();
        config.server.base_url = "ftp://127.0.0.1".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::BaseUrl { .. })));

        config.server.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::BaseUrl { .. })));
    }

    #[test]
    fn test_rejects_unknown_default_quality() {
        let mut config = AppConfig::default();
        config.quality.default = "4k".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("4k"));
    }

    #[test]
    fn test_rejects_duplicate_quality_values() {
        let mut config = AppConfig::default();
        config.quality.options.push(QualityOption::new("best", "Again"));
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_empty_domains_and_zero_timeout() {
        let mut config = AppConfig::default();
        config.sources.supported_domains = vec![" ".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.probe_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
