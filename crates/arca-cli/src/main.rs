//! `arca`: AFIP/ARCA invoicing and receipt printing.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use arca_cli::commands::{self, LabelRequest};
use arca_cli::config_handlers::handle_config_command;
use arca_cli::{Cli, Command};
use arca_core::{ArcaConfig, ConfigManager};

const VERBOSE_FILTER: &str = "info,arca_core=debug,arca_wsaa=debug,arca_wsfe=debug,arca_qr=debug,arca_escpos=debug,arca_cli=debug";

fn init_tracing(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one command; `Ok(false)` means it completed but found problems.
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config.as_deref();
    let command = match cli.command {
        Command::Config { action } => {
            handle_config_command(config_path, action)?;
            return Ok(true);
        }
        other => other,
    };

    let config = ArcaConfig::load(config_path)?;
    tracing::debug!(environment = %config.afip.environment, "configuration loaded");

    match command {
        Command::Config { .. } => {}
        Command::Status => return commands::status(&config).await,
        Command::Login { service, force } => commands::login(&config, &service, force).await?,
        Command::Last { voucher_type } => {
            commands::last(&config, voucher_type).await?;
        }
        Command::Authorize { file, print } => {
            commands::authorize(&config, &file, print).await?;
        }
        Command::Receipt { file, out } => commands::receipt(&config, &file, out.as_deref()).await?,
        Command::Qr { file } => {
            commands::qr(&config, &file)?;
        }
        Command::Label {
            name,
            price,
            offer,
            savings,
            out,
        } => {
            let request = LabelRequest {
                name: &name,
                price: &price,
                offer,
                savings: savings.as_deref(),
            };
            commands::label(&config, request, out.as_deref()).await?;
        }
        Command::TestPrint { out } => commands::test_print(&config, out.as_deref()).await?,
    }
    Ok(true)
}
