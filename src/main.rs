//! cowrite relay server
//!
//! ## Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:4000, any origin
//! cowrite
//!
//! # Only accept browser traffic from the web client
//! CLIENT_URL=http://localhost:3000 cowrite
//!
//! # Custom port, debug output, JSONL event log
//! cowrite --port 8080 -vv --log-dir ./logs
//! ```
//!
//! Flags win over the environment (and a `.env` file, if present); an
//! environment key shadowed by a flag is not read.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cowrite_core::logging::JsonlLayer;
use cowrite_core::{server, ConfigOverrides, RelayConfig};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// cowrite - real-time text collaboration relay
#[derive(Parser)]
#[command(name = "cowrite")]
#[command(version)]
#[command(about = "Real-time text collaboration relay")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides PORT, default 4000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Allowed browser origin (overrides CLIENT_URL)
    #[arg(long)]
    client_url: Option<String>,

    /// Directory for the JSONL event log (disabled when unset)
    #[arg(long, env = "COWRITE_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

/// Default filter for a `-v` count when `RUST_LOG` is unset
fn verbosity_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn setup_logging(verbosity: u8, log_dir: Option<PathBuf>, instance: &str) -> Result<()> {
    let filter = verbosity_filter(verbosity);

    let jsonl = log_dir
        .map(|dir| JsonlLayer::new(&dir, instance))
        .transpose()
        .context("could not open JSONL log")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer())
        .with(jsonl)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = RelayConfig::from_env_with(ConfigOverrides {
        host: cli.host,
        port: cli.port,
        client_url: cli.client_url,
    })?;

    setup_logging(cli.verbose, cli.log_dir, &format!("relay-{}", config.port))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.socket_addr(),
        "Starting cowrite"
    );

    server::run(config, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C, shutting down");
    })
    .await?;

    info!("Goodbye");
    Ok(())
}
