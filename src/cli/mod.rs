//! CLI module
//!
//! Provides:
//! - Argument parsing (clap)
//! - Configuration loading (file → env → flags)
//! - data_dir resolution (flag → config → env → cwd)
//! - Logging bootstrap
//! - Command dispatch (serve, backup, export, set-password)

pub mod args;
pub mod config;
pub mod data_root;
pub mod dispatch;
pub mod logging;

// Re-exports
pub use args::{Cli, Command, ExportFormat};
pub use config::AppConfig;
pub use data_root::{resolve_data_dir, DataPaths};
pub use dispatch::{run, ExitCode};
pub use logging::init_logging;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] familytree_databases::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0:#}")]
    Execution(#[from] anyhow::Error),
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_DB_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
