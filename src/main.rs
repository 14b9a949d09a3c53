//! AbuseIPDB MCP server CLI.

use abuseipdb_mcp_server::config::API_KEY_ENV;
use abuseipdb_mcp_server::{Config, McpServer};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "abuseipdb-mcp-server")]
#[command(about = "MCP server exposing AbuseIPDB IP checks and abuse reports over stdio")]
#[command(version)]
struct Args {
    /// Path to configuration file (defaults to environment-only configuration)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // stdout carries protocol frames, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match args.config {
        Some(ref path) => {
            info!(config = %path.display(), "Loading configuration");
            Config::load(path)?
        }
        None => {
            let config = Config::from_env();
            config.validate()?;
            config
        }
    };

    if config.abuseipdb.credential().is_none() {
        warn!(
            env = API_KEY_ENV,
            "No API key configured; every tool call will return a configuration error"
        );
    }

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let server = McpServer::new(&config)?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}
