//! library-mcp - MCP server exposing a personal document library to AI agents

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use library_mcp::config::{Backoff, ServerConfig, ServerOptions, DEFAULT_PORT};
use library_mcp::mcp::McpServer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ValueEnum, Debug, Copy, Clone)]
enum BackoffArg {
    Fixed,
    Linear,
}

#[derive(Parser, Debug)]
#[command(name = "library-mcp")]
#[command(about = "MCP server exposing a personal document library over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (1-65535)
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u32,

    /// JSON library export to serve
    #[arg(long)]
    library: Option<PathBuf>,

    /// Idle time after which a session expires
    #[arg(long)]
    session_timeout_ms: Option<u64>,

    /// Seconds between session expiry sweeps
    #[arg(long)]
    sweep_interval_secs: Option<u64>,

    /// Cap on the request header block
    #[arg(long)]
    max_request_bytes: Option<usize>,

    /// Cap on a request body
    #[arg(long)]
    max_body_bytes: Option<usize>,

    /// Bytes requested per read
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Wait between idle read attempts
    #[arg(long)]
    idle_retry_ms: Option<u64>,

    /// Idle read attempts before giving up on a connection
    #[arg(long)]
    max_idle_retries: Option<u32>,

    /// Idle retry schedule
    #[arg(long, value_enum, default_value = "fixed")]
    backoff: BackoffArg,

    /// Seconds a kept-alive connection may idle between requests
    #[arg(long)]
    keep_alive_timeout_secs: Option<u64>,

    /// Requests served on one connection before it is closed
    #[arg(long)]
    max_requests_per_connection: Option<usize>,

    /// Directory for the HTTP exchange log (LIBRARY_MCP_HTTP_LOG=1 enables it)
    #[arg(long)]
    http_log_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let options = ServerOptions {
        library_path: args.library,
        session_timeout_ms: args.session_timeout_ms,
        sweep_interval_secs: args.sweep_interval_secs,
        max_request_bytes: args.max_request_bytes,
        max_body_bytes: args.max_body_bytes,
        chunk_size: args.chunk_size,
        idle_retry_ms: args.idle_retry_ms,
        max_idle_retries: args.max_idle_retries,
        backoff: Some(match args.backoff {
            BackoffArg::Fixed => Backoff::Fixed,
            BackoffArg::Linear => Backoff::Linear,
        }),
        keep_alive_timeout_secs: args.keep_alive_timeout_secs,
        max_requests_per_connection: args.max_requests_per_connection,
        http_log_dir: args.http_log_dir,
    };

    let config = ServerConfig::new(args.host, args.port, options)?;

    info!("Starting library-mcp server");

    let server = McpServer::with_library(config)?;
    let handle = match server.start().await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Server error: {}", e);
            std::process::exit(1);
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    handle.stop().await;

    Ok(())
}
