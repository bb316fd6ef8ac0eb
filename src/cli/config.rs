//! Configuration
//!
//! Layered in this order, later wins:
//! 1. Built-in defaults
//! 2. `familytree.toml` (or the file given with `--config`)
//! 3. `FAMILYTREE_*` environment variables
//! 4. Command-line flags (applied by the dispatcher)

use familytree_api::{ApiConfig, AuthConfig};
use familytree_databases::BackupConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cli::{Error, Result};

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "familytree.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data directory; resolved by `data_root` when unset
    pub data_dir: Option<PathBuf>,
    pub server: ServerConfig,
    pub auth: AuthSection,
    pub backup: BackupSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let api = ApiConfig::default();
        Self {
            host: api.host,
            port: api.port,
            cors_origins: api.cors_origins,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub required: bool,
    pub default_password: String,
    pub session_days: i64,
    pub hash_rounds: u32,
}

impl Default for AuthSection {
    fn default() -> Self {
        let auth = AuthConfig::default();
        Self {
            required: auth.required,
            default_password: auth.default_password,
            session_days: auth.session_days,
            hash_rounds: auth.hash_rounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackupSection {
    pub max_backups: usize,
    /// Seconds between two automatic backups after edits
    pub auto_interval_secs: u64,
    /// Hours between scheduled backups while serving; 0 disables them
    pub schedule_hours: u64,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            max_backups: 100,
            auto_interval_secs: 300,
            schedule_hours: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub json: bool,
    /// Directory for a daily rolling log file; stdout only when unset
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load the file layer. An explicit path must exist; the default file is
    /// optional.
    pub fn from_file(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "config file '{}' does not exist",
                    path.display()
                )));
            }
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)?;
        debug!("Loading configuration from {}", path.display());
        Self::parse(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `FAMILYTREE_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("FAMILYTREE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(host) = lookup("FAMILYTREE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("FAMILYTREE_PORT") {
            self.server.port = parse_var("FAMILYTREE_PORT", &port)?;
        }
        if let Some(required) = lookup("FAMILYTREE_AUTH_REQUIRED") {
            self.auth.required = parse_bool("FAMILYTREE_AUTH_REQUIRED", &required)?;
        }
        if let Some(password) = lookup("FAMILYTREE_DEFAULT_PASSWORD") {
            self.auth.default_password = password;
        }
        if let Some(level) = lookup("FAMILYTREE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("FAMILYTREE_LOG_JSON") {
            self.logging.json = parse_bool("FAMILYTREE_LOG_JSON", &json)?;
        }
        Ok(())
    }

    pub fn api_config(&self, upload_dir: PathBuf) -> ApiConfig {
        ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            upload_dir,
            cors_origins: self.server.cors_origins.clone(),
            auth: AuthConfig {
                required: self.auth.required,
                default_password: self.auth.default_password.clone(),
                session_days: self.auth.session_days,
                hash_rounds: self.auth.hash_rounds,
            },
            ..ApiConfig::default()
        }
    }

    pub fn backup_config(&self, dir: PathBuf) -> BackupConfig {
        BackupConfig {
            max_backups: self.backup.max_backups,
            auto_interval: Duration::from_secs(self.backup.auto_interval_secs),
            ..BackupConfig::new(dir)
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} has an invalid value: {value}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{name} must be a boolean, got {value}"))),
    }
}
