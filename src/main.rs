//! Spectra CLI entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spectra_cli::config::SpectraConfig;
use spectra_cli::controller::SpectraCore;
use spectra_core_types::SessionId;

#[derive(Parser)]
#[command(
    name = "spectra",
    about = "Intent execution pipeline for autonomous web browsing",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute a natural-language browsing intent
    Run {
        /// The instruction, e.g. "Navigate to https://example.com and take a screenshot"
        intent: String,

        /// Reuse an existing session id instead of creating a fresh one
        #[arg(long)]
        session: Option<String>,

        /// Path to a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the per-step timeout, in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },

    /// Print the effective configuration
    ConfigShow {
        /// Path to a configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            intent,
            session,
            config,
            timeout,
        } => run_intent(intent, session, config, timeout).await,
        Commands::ConfigShow { config } => {
            let config = SpectraConfig::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_intent(
    intent: String,
    session: Option<String>,
    config_path: Option<PathBuf>,
    timeout: Option<f64>,
) -> Result<()> {
    let mut config = SpectraConfig::load(config_path.as_deref())?;
    if let Some(timeout) = timeout {
        config.default_timeout = timeout;
    }

    let core = Arc::new(SpectraCore::new(config).context("pipeline initialization failed")?);
    let _background = core.start_background_tasks();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; aborting at the next safe checkpoint");
                cancel.cancel();
            }
        });
    }

    let session_id = session.map(SessionId);
    info!(intent = %intent, "executing intent");
    let result = core.execute_intent(&intent, session_id, cancel).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
