//! Configuration loading.
//!
//! Values come from a TOML file (`~/.config/glbackup/config.toml` unless
//! overridden with `--config`), with `GLBACKUP_*` environment variables
//! taking precedence over the file. The resulting `Config` is passed
//! explicitly into every component; nothing reads configuration globally.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BackupError;

/// Default number of concurrent per-project workers.
fn default_concurrency() -> usize {
    4
}

/// Default request timeout in seconds.
fn default_timeout_secs() -> u64 {
    30
}

fn default_sink() -> SinkKind {
    SinkKind::File
}

/// Where snapshots are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// JSON documents under the backup directory.
    File,
    /// Rows in the local SQLite database.
    Database,
    /// Both of the above in one run.
    Both,
}

/// GitLab connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    /// Base URL of the instance (e.g., `https://gitlab.example.com`).
    pub base_url: String,

    /// Personal access token with `read_api` and `read_repository` scopes.
    pub token: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Backup destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory receiving snapshots and repository mirrors.
    pub backup_dir: String,

    /// Snapshot sink strategy.
    #[serde(default = "default_sink")]
    pub sink: SinkKind,

    /// SQLite database path (database sink). Defaults to
    /// `<backup_dir>/glbackup.db`.
    #[serde(default)]
    pub db_path: Option<String>,

    /// Concurrent per-project workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Full tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gitlab: GitLabConfig,
    pub backup: BackupConfig,
}

impl Config {
    /// Load configuration from `path` (or the default location when None),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, BackupError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let mut config: Config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                BackupError::config(format!(
                    "failed to read {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
            toml::from_str(&content).map_err(|e| {
                BackupError::config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else if env_has_minimum() {
            // No file, but the environment carries everything required.
            Config {
                gitlab: GitLabConfig {
                    base_url: String::new(),
                    token: String::new(),
                    timeout_secs: default_timeout_secs(),
                },
                backup: BackupConfig {
                    backup_dir: String::new(),
                    sink: default_sink(),
                    db_path: None,
                    concurrency: default_concurrency(),
                },
            }
        } else {
            return Err(BackupError::config(format!(
                "no config file at {} and GLBACKUP_URL/GLBACKUP_TOKEN/GLBACKUP_BACKUP_DIR not set",
                config_path.display()
            )));
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GLBACKUP_URL") {
            self.gitlab.base_url = url;
        }
        if let Ok(token) = std::env::var("GLBACKUP_TOKEN") {
            self.gitlab.token = token;
        }
        if let Ok(dir) = std::env::var("GLBACKUP_BACKUP_DIR") {
            self.backup.backup_dir = dir;
        }
        if let Ok(db) = std::env::var("GLBACKUP_DB_PATH") {
            self.backup.db_path = Some(db);
        }
    }

    fn validate(&self) -> Result<(), BackupError> {
        if self.gitlab.base_url.is_empty() {
            return Err(BackupError::config("gitlab.base_url is required"));
        }
        if self.gitlab.token.is_empty() {
            return Err(BackupError::config("gitlab.token is required"));
        }
        if self.backup.backup_dir.is_empty() {
            return Err(BackupError::config("backup.backup_dir is required"));
        }
        if self.backup.concurrency == 0 {
            return Err(BackupError::config("backup.concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Backup directory with `~` expanded.
    pub fn backup_dir(&self) -> PathBuf {
        expand_tilde(&self.backup.backup_dir)
    }

    /// SQLite database path, defaulting to `<backup_dir>/glbackup.db`.
    pub fn db_path(&self) -> PathBuf {
        match &self.backup.db_path {
            Some(p) => expand_tilde(p),
            None => self.backup_dir().join("glbackup.db"),
        }
    }
}

/// Default config file location: `~/.config/glbackup/config.toml`.
pub fn default_config_path() -> Result<PathBuf, BackupError> {
    Ok(dirs::config_dir()
        .ok_or_else(|| BackupError::config("could not determine config directory"))?
        .join("glbackup")
        .join("config.toml"))
}

fn env_has_minimum() -> bool {
    std::env::var("GLBACKUP_URL").is_ok()
        && std::env::var("GLBACKUP_TOKEN").is_ok()
        && std::env::var("GLBACKUP_BACKUP_DIR").is_ok()
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
