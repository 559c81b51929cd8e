//! dayboard CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use dayboard_client::cli::{AuthAction, Cli, Command, ConfigAction};
use dayboard_client::commands;
use dayboard_client::config::ClientConfig;
use dayboard_client::error::ClientResult;
use dayboard_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::cli(cli.debug)) {
        eprintln!("warning: {}", e);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Cancels in-flight work on Ctrl+C so partial results are still printed.
fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received Ctrl+C, cancelling");
            cancel.cancel();
        }
    });
}

async fn run(cli: Cli, cancel: &CancellationToken) -> ClientResult<()> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    debug!(?config, "loaded configuration");

    let credentials = cli.credentials.as_deref();

    match cli.command() {
        Command::Today(args) => commands::agenda::today(&args, &config, credentials, cancel).await,
        Command::Calendars { json } => {
            commands::agenda::calendars(json, &config, credentials, cancel).await
        }
        Command::Whoami => commands::agenda::whoami(&config, credentials, cancel).await,
        Command::Auth { action } => match action {
            AuthAction::Reset => commands::auth::reset(&config),
        },
        Command::Weather(args) => commands::weather::forecast(&args, &config, cancel).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, cli.config.as_deref()),
            ConfigAction::Path => commands::config::path(cli.config.as_deref()),
        },
    }
}
