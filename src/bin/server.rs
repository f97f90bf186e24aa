//! Schema registry server
//!
//! Serves the content-addressed schema store over HTTP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use schemavault::{server, SchemaRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemavault-server")]
#[command(about = "Content-addressed schema registry over HTTP")]
struct Cli {
    /// Root directory where schema files are stored
    #[arg(short, long)]
    root: PathBuf,

    /// Port to bind to
    #[arg(short, long)]
    port: u16,

    /// Host to bind to; all interfaces if not specified
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Enable the GET /shutdown endpoint
    #[arg(long)]
    enable_shutdown: bool,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "schemavault=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let registry = SchemaRegistry::open(&cli.root)
        .with_context(|| format!("opening registry at {}", cli.root.display()))?;

    let host = cli.bind.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let addr = SocketAddr::new(host, cli.port);
    server::serve(Arc::new(registry), addr, cli.enable_shutdown)
        .await
        .context("serving schema registry")?;
    Ok(())
}
