//! Runtime context shared by every command.
//!
//! Resolves the configuration file and the database path against the data
//! directory, opens the mirror store and builds engines.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync_engine::{Config, EngineOptions, HttpRemote, RemoteSource, SyncEngine};
use sync_store::SqliteStorage;
use sync_types::RepoScope;

/// Config file looked up in the data directory when `--config` is absent.
pub const CONFIG_FILE: &str = "issue-sync.toml";

/// Bootstrap attempts for one-shot commands when the configured policy
/// retries forever.
pub const ONE_SHOT_ATTEMPTS: u32 = 5;

/// Loaded configuration plus an open store.
pub struct AppContext {
    config: Config,
    data_dir: PathBuf,
    store: Arc<SqliteStorage>,
}

impl AppContext {
    /// Load the configuration and open the database.
    ///
    /// An explicit `config_path` must exist; otherwise `<data_dir>/issue-sync.toml`
    /// is used when present, and defaults when not.
    pub async fn load(config_path: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::from_file(path)?,
            None => {
                let default_path = data_dir.join(CONFIG_FILE);
                if default_path.exists() {
                    Config::from_file(&default_path)?
                } else {
                    tracing::debug!("No config file at {}, using defaults", default_path.display());
                    Config::default()
                }
            }
        };
        Self::open(config, data_dir).await
    }

    /// Open the database described by an already loaded configuration.
    pub async fn open(config: Config, data_dir: &Path) -> Result<Self> {
        let path = resolve(data_dir, &config.storage.database);
        let store = SqliteStorage::new(&path)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        tracing::debug!("Opened mirror at {}", path.display());

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            store: Arc::new(store),
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Absolute (or data-dir relative) path of the database file.
    pub fn database_path(&self) -> PathBuf {
        resolve(&self.data_dir, &self.config.storage.database)
    }

    /// Shared handle to the mirror store.
    pub fn store(&self) -> Arc<SqliteStorage> {
        Arc::clone(&self.store)
    }

    /// Parse one `owner/name` argument.
    pub fn repository(&self, name: &str) -> Result<RepoScope> {
        RepoScope::parse(name).with_context(|| format!("Invalid repository {name:?}"))
    }

    /// Repositories named on the command line, or the configured ones.
    pub fn repositories(&self, explicit: &[String]) -> Result<Vec<RepoScope>> {
        let scopes = if explicit.is_empty() {
            self.config.repositories()?
        } else {
            explicit
                .iter()
                .map(|name| self.repository(name))
                .collect::<Result<Vec<_>>>()?
        };
        if scopes.is_empty() {
            anyhow::bail!("No repositories given and sync.repositories is empty");
        }
        Ok(scopes)
    }

    /// HTTP client for the configured tracker.
    pub fn http_remote(&self, token: Option<String>) -> Result<Arc<HttpRemote>> {
        let token = self.config.token(token)?;
        let remote = HttpRemote::new(&self.config.remote, &token)
            .context("Failed to build HTTP client")?;
        Ok(Arc::new(remote))
    }

    /// Engine for a long-running schedule, with the configured retry policy.
    pub fn engine<R: RemoteSource + 'static>(
        &self,
        scope: RepoScope,
        remote: Arc<R>,
    ) -> SyncEngine<R> {
        SyncEngine::new(
            scope,
            remote,
            self.store.clone(),
            EngineOptions::from_config(&self.config),
        )
    }

    /// Engine for a one-shot command; an unlimited retry policy is capped.
    pub fn one_shot_engine<R: RemoteSource + 'static>(
        &self,
        scope: RepoScope,
        remote: Arc<R>,
    ) -> SyncEngine<R> {
        let mut options = EngineOptions::from_config(&self.config);
        if options.bootstrap.is_unlimited() {
            options.bootstrap.max_attempts = ONE_SHOT_ATTEMPTS;
        }
        SyncEngine::new(scope, remote, self.store.clone(), options)
    }
}

fn resolve(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}
