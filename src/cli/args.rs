//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Self-hosted family tree service
#[derive(Debug, Parser)]
#[command(name = "familytree")]
#[command(version)]
#[command(about = "Family tree web service with backups and GEDCOM export", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./familytree.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the database, uploads and backups
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Take a manual backup of the database
    Backup {
        #[arg(long)]
        description: Option<String>,
    },
    /// Export the tree
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Gedcom)]
        format: ExportFormat,
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the login password
    SetPassword { password: String },
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve {
            host: None,
            port: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Gedcom,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["familytree"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Command::default());
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["familytree", "serve", "--port", "8080", "--host", "0.0.0.0"])
            .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Serve {
                host: Some("0.0.0.0".to_string()),
                port: Some(8080)
            })
        );
    }

    #[test]
    fn test_export_and_global_flags() {
        let cli = Cli::try_parse_from([
            "familytree",
            "export",
            "--format",
            "json",
            "-o",
            "tree.json",
            "--data-dir",
            "/srv/tree",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/tree")));
        assert_eq!(
            cli.command,
            Some(Command::Export {
                format: ExportFormat::Json,
                output: Some(PathBuf::from("tree.json"))
            })
        );
    }

    #[test]
    fn test_set_password_requires_value() {
        assert!(Cli::try_parse_from(["familytree", "set-password"]).is_err());
        assert!(Cli::try_parse_from(["familytree", "serve", "--port", "high"]).is_err());
    }
}
