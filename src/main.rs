//! modproxy: a caching Go module proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     GET /<module>/@v/...   ┌────────┐   ┌────────────┐   ┌──────────┐
//!   ────────────────────────▶│  http  │──▶│   module   │──▶│ dispatch │
//!                            │ server │   │ path codec │   └────┬─────┘
//!                            └────────┘   └────────────┘        │ splitter decides
//!                                                 ┌─────────────┴─────────────┐
//!                                                 ▼                           ▼
//!                                        ┌─────────────────┐        ┌──────────────────┐
//!                                        │ upstream fetcher│ ─fail─▶│  local fetcher   │
//!                                        │  (origin proxy) │        │ (cache + go tool)│
//!                                        └─────────────────┘        └──────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use modproxy::config::load_config;
use modproxy::lifecycle::{self, signals, Shutdown};
use modproxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "modproxy")]
#[command(about = "Caching Go module proxy", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MODPROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(short, long)]
    listen: Option<String>,

    /// Upstream proxy base URL, overrides the configuration
    #[arg(short, long)]
    upstream: Option<String>,

    /// Local cache root, overrides the configuration
    #[arg(long)]
    cache_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), |config| {
        if let Some(listen) = cli.listen {
            config.listener.bind_address = listen;
        }
        if let Some(upstream) = cli.upstream {
            config.upstream.url = upstream;
        }
        if let Some(root) = cli.cache_root {
            config.storage.cache_root = root;
        }
    })?;

    logging::init_logging(&config.observability)?;
    tracing::info!("modproxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = lifecycle::build(config).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
