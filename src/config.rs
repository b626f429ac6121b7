//! Configuration management for urlmatrix
//!
//! Configuration is loaded from `./config/urlmatrix.toml` (or `--config`).
//! All defaults live in the config template, which is also embedded in the
//! binary and used when no file is present.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::retry::{BackoffStrategy, RetryPolicy};

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/urlmatrix.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/urlmatrix.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be greater than 0")]
    NotPositive { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub store: StoreConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub rules: RulesConfig,
    pub routes: RoutesConfig,
    pub report: ReportConfig,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub base_url: String,
    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,
}

fn default_base_url_env() -> String {
    "NEXT_PUBLIC_APP_URL".to_string()
}

/// PostgREST content store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub url_env: String,
    pub key_env: String,
    pub page_size: usize,
    #[serde(default = "default_store_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_store_timeout_ms() -> u64 {
    30_000
}

/// HTTP verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept: String,
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub method_fallback_statuses: Vec<u16>,
    pub max_redirects: usize,
    #[serde(default = "default_progress_every_batches")]
    pub progress_every_batches: usize,
}

fn default_progress_every_batches() -> usize {
    10
}

/// Retry configuration for the store fetch and the URL verifier
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub strategy: BackoffStrategy,
    pub fetch_max_attempts: u32,
    pub fetch_backoff_ms: u64,
    pub verify_max_attempts: u32,
    pub verify_backoff_ms: u64,
}

impl RetryConfig {
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch_max_attempts,
            Duration::from_millis(self.fetch_backoff_ms),
            self.strategy,
        )
    }

    pub fn verify_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.verify_max_attempts,
            Duration::from_millis(self.verify_backoff_ms),
            self.strategy,
        )
    }
}

/// What to do with content pages whose category matches no template
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedPolicy {
    #[default]
    Warn,
    Ignore,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnmappedConfig {
    #[serde(default)]
    pub policy: UnmappedPolicy,
    #[serde(default)]
    pub expected_categories: Vec<String>,
}

/// Path builder rule set
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    pub matrix_frameworks: Vec<String>,
    pub role_matrix_frameworks: Vec<String>,
    pub compliance_frameworks: Vec<String>,
    pub ai_framework_slug: String,
    pub ai_categories: Vec<String>,
    pub top_tools: Vec<String>,
    #[serde(default)]
    pub unmapped: UnmappedConfig,
}

/// Literal routes and static tool list
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    pub static_paths: Vec<String>,
    #[serde(default)]
    pub fallback_tools: Vec<String>,
}

/// Report artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub output_file: PathBuf,
    pub snapshot_file: PathBuf,
    pub failure_sample_size: usize,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded template
    pub fn embedded_default() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Load an explicit path (which must exist), or the default path falling
    /// back to the embedded template when it is absent.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => match Self::load() {
                Err(ConfigError::FileNotFound(path)) => {
                    warn!(
                        "No configuration at {}, using built-in defaults (run with --init to create one)",
                        path.display()
                    );
                    Self::embedded_default()
                }
                other => other,
            },
        }
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.site.base_url).is_err() {
            return Err(ConfigError::InvalidUrl {
                field: "site.base_url".to_string(),
                url: self.site.base_url.clone(),
            });
        }

        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }

        let positives = [
            ("http.timeout_ms", self.http.timeout_ms == 0),
            ("http.concurrency", self.http.concurrency == 0),
            ("http.progress_every_batches", self.http.progress_every_batches == 0),
            ("store.page_size", self.store.page_size == 0),
            ("store.request_timeout_ms", self.store.request_timeout_ms == 0),
            ("retry.fetch_max_attempts", self.retry.fetch_max_attempts == 0),
            ("retry.verify_max_attempts", self.retry.verify_max_attempts == 0),
        ];
        for (field, is_zero) in positives {
            if is_zero {
                return Err(ConfigError::NotPositive {
                    field: field.to_string(),
                });
            }
        }

        if self.store.url_env.is_empty() || self.store.key_env.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "store.url_env / store.key_env".to_string(),
            });
        }

        if self.rules.ai_framework_slug.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "rules.ai_framework_slug".to_string(),
            });
        }

        for (i, route) in self.routes.static_paths.iter().enumerate() {
            if route.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("routes.static_paths[{}]", i),
                });
            }
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::write_default_config(Path::new(CONFIG_PATH))
    }

    pub fn write_default_config(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}
