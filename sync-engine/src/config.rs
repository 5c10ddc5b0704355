//! Configuration loading for issue-sync.
//!
//! Configuration is loaded from a TOML file (default: `issue-sync.toml`).
//! Every section and key is optional.
//!
//! ```toml
//! [remote]
//! api_url = "https://api.github.com"
//! token_env = "GITHUB_TOKEN"
//!
//! [sync]
//! repositories = ["rust-lang/rust"]
//! poll_interval_secs = 300
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use sync_core::BackoffConfig;
use sync_types::RepoScope;

/// Root configuration for issue-sync.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Remote tracker configuration.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Sync loop configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Bootstrap retry policy.
    #[serde(default)]
    pub backoff: BackoffSettings,
}

/// Remote tracker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// API base URL (default: https://api.github.com).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable holding the access token (default: GITHUB_TOKEN).
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file. Relative paths resolve against the
    /// data directory.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Sync loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Repositories to mirror, as `owner/name`.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Seconds between the end of one cycle and the start of the next
    /// (default: 300).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Pages walked before a fetch is abandoned (default: 1000).
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// Bootstrap retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffSettings {
    /// Delay before the first retry in milliseconds (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Growth factor per failed attempt (default: 2.0).
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Delay cap in milliseconds (default: 60000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Attempts before giving up; 0 retries forever (default: 0).
    #[serde(default)]
    pub max_attempts: u32,
    /// Randomize delays by up to 25% (default: true).
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

// Default value functions
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("issue-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("issue-sync.db")
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

fn default_max_pages() -> u32 {
    sync_core::DEFAULT_MAX_PAGES
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            factor: default_factor(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: 0,
            jitter: default_jitter(),
        }
    }
}

impl BackoffSettings {
    /// Convert to the policy type used by the retry executor.
    pub fn to_backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            factor: self.factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            jitter: self.jitter,
        }
    }
}

impl SyncConfig {
    /// Delay between cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.repositories()?;
        if self.sync.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.sync.max_pages == 0 {
            return Err(ConfigError::Invalid("sync.max_pages must be at least 1".into()));
        }
        if self.backoff.factor.is_nan() || self.backoff.factor < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff.factor must be >= 1.0, got {}",
                self.backoff.factor
            )));
        }
        if self.backoff.max_delay_ms < self.backoff.initial_delay_ms {
            return Err(ConfigError::Invalid(
                "backoff.max_delay_ms must not be below backoff.initial_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// Configured repositories as scope keys.
    pub fn repositories(&self) -> Result<Vec<RepoScope>, ConfigError> {
        self.sync
            .repositories
            .iter()
            .map(|name| {
                RepoScope::parse(name).map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .collect()
    }

    /// Resolve the access token: an explicit value wins over the environment.
    pub fn token(&self, explicit: Option<String>) -> Result<String, ConfigError> {
        if let Some(token) = explicit.filter(|t| !t.is_empty()) {
            return Ok(token);
        }
        match std::env::var(&self.remote.token_env) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingToken {
                var: self.remote.token_env.clone(),
            }),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// No token was given and the environment variable is unset.
    #[error("no access token: set {var} or pass --token")]
    MissingToken {
        /// Environment variable that was consulted.
        var: String,
    },
}
