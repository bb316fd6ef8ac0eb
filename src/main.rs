//! familytree: self-hosted family tree service
//!
//! Loads configuration, installs logging and dispatches the subcommand.

use clap::Parser;

use familytree::cli::{init_logging, run, AppConfig, Cli, EXIT_FAILURE};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let code = run(cli, config).await;
    drop(guard);
    std::process::exit(code);
}

fn load_config(cli: &Cli) -> familytree::cli::Result<AppConfig> {
    let mut config = AppConfig::from_file(cli.config.as_deref())?;
    config.apply_env()?;
    Ok(config)
}
