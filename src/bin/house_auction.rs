//! Auction read-model service.
//!
//! - CLI arguments and TOML config file support
//! - Bid ingestion and settlement reconciliation over HTTP
//! - Structured logging with tracing
//! - Prometheus metrics and periodic summaries
//! - JSON snapshot persistence of the read-model

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use house_auction::{
    chain::{JsonRpcClient, RpcBidLedger, RpcTokenMetadata},
    config::AppConfig,
    engine::AuctionEngine,
    identity::{IdentityService, NeynarResolver},
    logging::{init_logging, LogFormat},
    metrics::ServiceMetrics,
    pricing::{DecimalsResolver, DexScreenerOracle, Normalizer, PriceOracle},
    server::{router, AppState},
    store::MemoryStore,
    HttpClient,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "house_auction")]
#[command(version, about = "Auction read-model and settlement service", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "house_auction.toml")]
    config: PathBuf,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// JSON-RPC endpoint of the chain holding the auction contract
    #[arg(long, env = "HOUSE_RPC_URL")]
    rpc_url: Option<String>,

    /// Neynar API key for display identities
    #[arg(long, env = "NEYNAR_API_KEY", hide_env_values = true)]
    neynar_api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Log file path (logs to both file and stdout)
    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve,
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "house_auction.toml")]
        output: PathBuf,
    },
    /// Validate config without running
    ValidateConfig,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::GenerateConfig { ref output }) => {
            AppConfig::write_sample(output)?;
            println!("Sample config written to: {}", output.display());
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            config.validate()?;
            println!("Config OK: {}", cli.config.display());
            println!("  bind:             {}", config.server.bind);
            println!("  rpc:              {}", config.chain.rpc_url);
            println!(
                "  auction contract: {}",
                config
                    .chain
                    .auction_contract
                    .map_or_else(|| "none (host-supplied lists only)".to_string(), |a| a.to_string())
            );
            println!("  oracle enabled:   {}", config.oracle.enabled);
            println!("  identity:         {}", if config.identity.api_key.is_some() { "neynar" } else { "placeholders" });
            println!("  known tokens:     {}", config.tokens.len());
            return Ok(());
        }
        Some(Commands::Serve) | None => {}
    }

    let config = load_config(&cli)?;
    config.validate()?;
    let _guards = init_logging(&config.logging, None)?;

    serve(config).await
}

// ============================================================================
// Helper Functions
// ============================================================================

/// File config with CLI and environment overrides applied.
fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(rpc_url) = &cli.rpc_url {
        config.chain.rpc_url = rpc_url.clone();
    }
    if let Some(key) = &cli.neynar_api_key {
        config.identity.api_key = Some(key.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.parse::<LogFormat>()?;
    }
    if let Some(file) = &cli.log_file {
        config.logging.log_file = Some(file.clone());
    }
    Ok(config)
}

async fn load_store(path: Option<&Path>) -> Result<Arc<MemoryStore>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(Arc::new(MemoryStore::new()));
    };
    match MemoryStore::load_snapshot(path).await? {
        Some(store) => {
            info!(path = %path.display(), "Read-model restored from snapshot");
            Ok(Arc::new(store))
        }
        None => {
            info!(path = %path.display(), "No snapshot found, starting empty");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn save_store(store: &MemoryStore, path: &Path) {
    if let Err(e) = store.save_snapshot(path, Utc::now()).await {
        error!(path = %path.display(), error = %e, "Snapshot save failed");
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(ServiceMetrics::new());

    let rpc = Arc::new(JsonRpcClient::new(HttpClient::new(
        config.chain.rpc_url.clone(),
        Duration::from_millis(config.chain.rpc_timeout_ms),
    )?));
    let decimals = DecimalsResolver::new(
        config.tokens.clone(),
        Some(Arc::new(RpcTokenMetadata::new(rpc.clone()))),
        Duration::from_millis(config.chain.rpc_timeout_ms),
    );

    let oracle: Option<Arc<dyn PriceOracle>> = if config.oracle.enabled {
        let http = HttpClient::new(config.oracle.base_url.clone(), config.oracle.timeout())?;
        Some(Arc::new(DexScreenerOracle::new(http, config.oracle.chain.clone())))
    } else {
        warn!("Price oracle disabled; only pegged tokens get USD values");
        None
    };
    let normalizer = Normalizer::new(decimals, oracle, config.oracle.timeout(), metrics.clone());

    let identity = match &config.identity.api_key {
        Some(key) => {
            let http = HttpClient::new(config.identity.base_url.clone(), config.identity.timeout())?;
            IdentityService::new(
                Some(Arc::new(NeynarResolver::new(http, key.clone()))),
                config.identity.timeout(),
                metrics.clone(),
            )
        }
        None => {
            warn!("No Neynar API key; display identities will be placeholders");
            IdentityService::disabled(metrics.clone())
        }
    };

    let snapshot_path = config.store.snapshot_path.clone();
    let store = load_store(snapshot_path.as_deref()).await?;

    let mut engine = AuctionEngine::new(
        store.clone(),
        Arc::new(normalizer),
        Arc::new(identity),
        metrics.clone(),
        config.engine.clone(),
    );
    match config.chain.auction_contract {
        Some(contract) => {
            engine = engine.with_ledger(Arc::new(RpcBidLedger::new(rpc.clone(), contract)));
            info!(contract = %contract, "Ledger reads enabled");
        }
        None => warn!("No auction contract configured; settlement requires a host-supplied bidder list"),
    }

    let app = router(AppState::new(Arc::new(engine)), &config.server)?;
    let addr = config.server.bind_addr()?;

    // Spawn periodic metrics logging
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            metrics_clone.log_summary();
        }
    });

    if let Some(path) = snapshot_path.clone() {
        let store = store.clone();
        let every = Duration::from_secs(config.store.snapshot_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                save_store(&store, &path).await;
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        version = env!("CARGO_PKG_VERSION"),
        oracle = config.oracle.enabled,
        snapshot = ?snapshot_path,
        "Serving"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(path) = snapshot_path {
        save_store(&store, &path).await;
        info!(path = %path.display(), "Final snapshot written");
    }
    metrics.log_summary();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
