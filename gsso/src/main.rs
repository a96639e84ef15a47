use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod commands;
mod common;
mod credential;
mod saml;
mod sts;

use auth::{AuthOrchestrator, AuthOutcome};
use commands::AuthCommand;
use common::config::{AppPaths, BrowserConfig};
use credential::CredentialStore;
use saml::playwright::PlaywrightDriver;
use saml::AssertionSession;
use sts::StsCredentialExchanger;

#[derive(Parser)]
#[command(
    name = "gsso",
    about = "Acquire AWS STS credentials via Google Workspace SAML in a browser",
    version = env!("CARGO_PKG_VERSION"),
    author = "ktruck"
)]
struct Cli {
    #[command(flatten)]
    auth: AuthCommand,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries only the credential envelope
    let log_level = if cli.verbose { "debug" } else { &cli.log_level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,gsso={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let request = cli.auth.to_request()?;
    let paths = AppPaths::resolve(
        cli.auth.cache_file.clone(),
        cli.auth.session_dir.clone(),
        cli.auth.node_dir.clone(),
    )
    .context("Failed to resolve gsso directories")?;

    let browser = BrowserConfig::new(&paths.node_dir)
        .with_node(cli.auth.node.clone())
        .with_npm(cli.auth.npm.clone());
    let driver = PlaywrightDriver::new(browser);
    let mut orchestrator = AuthOrchestrator::new(
        CredentialStore::new(&paths.cache_file),
        Arc::new(AssertionSession::new(driver, &paths.session_dir)),
        Arc::new(StsCredentialExchanger::new()),
    );
    info!("Credential cache: {}", orchestrator.store().path().display());

    let outcome = orchestrator.run(&request).await?;
    if let AuthOutcome::Fresh(_) = outcome {
        info!("Cached new credential for profile {}", request.profile());
    }

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", outcome.envelope())?;
    stdout.flush()?;

    Ok(())
}
