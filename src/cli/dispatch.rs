//! CLI command dispatch
//!
//! Dispatches to the command handlers:
//! - serve: run the HTTP service
//! - backup: take a manual backup
//! - export: write GEDCOM or JSON
//! - set-password: replace the login password

use chrono::Utc;
use familytree_api::auth::set_password;
use familytree_api::ApiServer;
use familytree_core::gedcom::export_gedcom;
use familytree_databases::{BackupManager, BackupTrigger, FamilyStore};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cli::data_root::{resolve_data_dir, DataPaths};
use crate::cli::{
    AppConfig, Cli, Command, Error, ExportFormat, Result, EXIT_DB_ERROR, EXIT_FAILURE,
    EXIT_SUCCESS,
};

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run the parsed command and return the process exit code
pub async fn run(cli: Cli, config: AppConfig) -> ExitCode {
    let data_dir = resolve_data_dir(
        cli.data_dir,
        config.data_dir.clone(),
        std::env::var("FAMILYTREE_HOME").ok(),
    );
    let paths = DataPaths::new(&data_dir);
    let command = cli.command.unwrap_or_default();

    match execute(command, &config, &paths).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            match e {
                Error::Database(_) => EXIT_DB_ERROR,
                _ => EXIT_FAILURE,
            }
        }
    }
}

/// Open the store and backup manager under `paths`
pub fn open_data(config: &AppConfig, paths: &DataPaths) -> Result<(FamilyStore, Arc<BackupManager>)> {
    paths.ensure()?;
    let store = FamilyStore::open(&paths.database)?;
    let backups = BackupManager::new(store.clone(), config.backup_config(paths.backups.clone()))?;
    Ok((store, Arc::new(backups)))
}

pub async fn execute(command: Command, config: &AppConfig, paths: &DataPaths) -> Result<()> {
    let (store, backups) = open_data(config, paths)?;
    match command {
        Command::Serve { host, port } => serve(config, paths, store, backups, host, port).await,
        Command::Backup { description } => {
            let backup = backups.create_backup(BackupTrigger::Manual, description.as_deref())?;
            println!("{} ({:.2} MB)", backup.filename, backup.file_size_mb);
            Ok(())
        }
        Command::Export { format, output } => {
            let rendered = render_export(&store, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    info!("Export written to {}", path.display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(rendered.as_bytes())?;
                    stdout.flush()?;
                }
            }
            Ok(())
        }
        Command::SetPassword { password } => {
            set_password(&store, &password, config.auth.hash_rounds)?;
            println!("Password updated");
            Ok(())
        }
    }
}

/// Render the whole tree in the requested format
pub fn render_export(store: &FamilyStore, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Gedcom => Ok(export_gedcom(&store.load_graph()?)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(
            &store.export_bundle(Utc::now())?,
        )?),
    }
}

async fn serve(
    config: &AppConfig,
    paths: &DataPaths,
    store: FamilyStore,
    backups: Arc<BackupManager>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut api_config = config.api_config(paths.uploads.clone());
    if let Some(host) = host {
        api_config.host = host;
    }
    if let Some(port) = port {
        api_config.port = port;
    }
    info!("Data directory: {}", paths.root.display());

    if config.backup.schedule_hours > 0 {
        let every = Duration::from_secs(config.backup.schedule_hours * 3600);
        tokio::spawn(scheduled_backups(Arc::clone(&backups), every));
    }

    ApiServer::new(api_config, store, backups).start().await?;
    Ok(())
}

/// Take a scheduled backup every `every`, starting one period from now
async fn scheduled_backups(backups: Arc<BackupManager>, every: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        ticker.tick().await;
        let manager = Arc::clone(&backups);
        let result = tokio::task::spawn_blocking(move || {
            manager.create_backup(BackupTrigger::Scheduled, Some("Scheduled backup"))
        })
        .await;
        match result {
            Ok(Ok(backup)) => info!("Scheduled backup {}", backup.filename),
            Ok(Err(e)) => warn!("Scheduled backup failed: {e}"),
            Err(e) => warn!("Scheduled backup task failed: {e}"),
        }
    }
}
