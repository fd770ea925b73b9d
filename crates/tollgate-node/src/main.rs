//! Tollgate node — entry point.
//!
//! Starts the HTTP 402 payment-challenge gateway with configuration from a
//! TOML file or defaults.

mod api;
mod config;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tollgate_gateway::{ChallengeStore, MemoryStore, PaymentGateway, RocksStore};
use tollgate_settlement::adapters::EvmRpcClient;
use tollgate_settlement::{NetworkRegistry, SettlementVerifier};

use config::{NodeConfig, StorageBackend};
use state::AppState;

/// Tollgate Gateway Node
#[derive(Parser, Debug)]
#[command(name = "tollgate-node", version, about = "Tollgate payment-challenge gateway node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "tollgate.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Handle --init flag
    if args.init {
        let config = NodeConfig::default();
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    // Load configuration
    let mut config = NodeConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    config.logging.level = args.log_level;

    tracing::info!("Tollgate node v{}", env!("CARGO_PKG_VERSION"));

    // Wire the gateway stack
    let store: Arc<dyn ChallengeStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Rocksdb => Arc::new(RocksStore::open(&config.storage.data_dir)?),
    };

    let networks = Arc::new(NetworkRegistry::builtin());
    let verifier = Arc::new(SettlementVerifier::new(
        Arc::clone(&networks),
        Arc::new(EvmRpcClient::new()),
    ));
    let gateway = Arc::new(PaymentGateway::new(
        config.gateway.clone(),
        store,
        Arc::clone(&verifier),
    ));

    let app_state = Arc::new(AppState {
        gateway: Arc::clone(&gateway),
        networks,
    });

    // Periodic expiry sweep: lazy checks catch overdue records on access,
    // this task catches the ones nobody asks about.
    let sweep_interval = config.sweep.interval_secs.max(1);
    let sweep_task = {
        let gateway = Arc::clone(&gateway);
        let verifier = Arc::clone(&verifier);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
            // First tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = chrono::Utc::now();
                let report = gateway.sweep(now).await;
                let cache_evicted = verifier.sweep_cache(now);
                tracing::debug!(
                    expired = report.expired,
                    evicted = report.evicted,
                    cache_evicted,
                    "sweep pass"
                );
            }
        })
    };

    let listen_addr: SocketAddr =
        format!("{}:{}", config.api.listen_addr, config.api.port).parse()?;

    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
        tracing::info!("received shutdown signal");
    };

    api::start_api_server(listen_addr, app_state, shutdown).await?;

    sweep_task.abort();
    tracing::info!("Tollgate node exited cleanly");
    Ok(())
}
