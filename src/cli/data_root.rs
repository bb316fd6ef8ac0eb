//! data_dir resolution
//!
//! Resolution priority:
//! 1. --data-dir <path> flag (highest priority)
//! 2. `data_dir` from the config file or `FAMILYTREE_DATA_DIR`
//! 3. $FAMILYTREE_HOME env var → $FAMILYTREE_HOME/data
//! 4. ./data (default)

use crate::cli::{Error, Result};
use std::path::{Path, PathBuf};

pub const DATABASE_FILE: &str = "familytree.db";

/// Resolve the data directory. Does not touch the filesystem.
pub fn resolve_data_dir(
    flag: Option<PathBuf>,
    configured: Option<PathBuf>,
    home: Option<String>,
) -> PathBuf {
    flag.or(configured)
        .or_else(|| home.map(|home| PathBuf::from(home).join("data")))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Files and directories under the data directory
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub database: PathBuf,
    pub uploads: PathBuf,
    pub backups: PathBuf,
}

impl DataPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            database: root.join(DATABASE_FILE),
            uploads: root.join("uploads"),
            backups: root.join("backups"),
        }
    }

    /// Create the directory layout if it is missing
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.root, &self.uploads, &self.backups] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::InvalidArgs(format!("cannot create data dir '{}': {e}", dir.display()))
            })?;
        }
        Ok(())
    }
}
