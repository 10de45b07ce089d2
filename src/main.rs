use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

use ssh_to_terminal::cli::Cli;
use ssh_to_terminal::config::{ConfigManager, SyncConfig};
use ssh_to_terminal::sync;

fn init_logging(debug: bool) {
    // RUST_LOG wins over --debug when set
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("ssh_to_terminal=debug")
    } else {
        EnvFilter::new("ssh_to_terminal=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let manager = ConfigManager::new(cli.config.clone())?;
    tracing::debug!("Config file: {}", manager.get_config_path().display());
    let app_config = manager.load_config()?;

    let config = SyncConfig::resolve(cli, app_config);
    tracing::debug!("Resolved configuration: {:?}", config);

    let outcome = sync::run(&config).context("Sync failed")?;

    if let Some(preview) = outcome.preview {
        print!("{}", preview);
    } else if outcome.written.is_none() && outcome.hosts_found == 0 {
        tracing::warn!("No SSH hosts found under {}", config.ssh_dir.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
