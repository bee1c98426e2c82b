//! hermodd — Hermod daemon.
//!
//! Serves the [`ChatProxy`](hermod::ChatProxy) pipeline over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use hermod::server::config::{Config, Secrets};
use hermod::{
    ChatProxy, Gateway, HermodError, MemoryLedger, OpenAiCompatClient, PolicyTable,
    ResponseCache, UsageTracker,
};

/// Hermod daemon — classifying, caching LLM proxy.
#[derive(Parser)]
#[command(name = "hermodd")]
#[command(version = hermod::PKG_VERSION)]
#[command(about = "Hermod LLM routing proxy daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "HERMOD_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // default: info for hermod; override with RUST_LOG
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hermod=info,tower_http=info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let proxy = build_proxy(&config, &secrets)?;

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| HermodError::Configuration(format!("Invalid address: {e}")))?;

    info!(version = hermod::PKG_VERSION, %addr, "hermodd starting");

    let router = hermod::server::router(Arc::new(proxy), &config.server.limits);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("hermodd shut down gracefully");
    Ok(())
}

/// Build the [`ChatProxy`] from configuration.
fn build_proxy(config: &Config, secrets: &Secrets) -> Result<ChatProxy, HermodError> {
    if config.models.is_empty() {
        warn!("no model tier configured; set DEFAULT_MODEL or [models] in config.toml");
    }
    let api_key = secrets.api_key();
    if api_key.is_none() {
        warn!("no upstream API key configured; requests will fail until one is set");
    }

    let client = OpenAiCompatClient::with_base_url(api_key, &config.upstream.base_url)?;
    let gateway = Gateway::with_config(
        Arc::new(client),
        config.models.clone(),
        config.gateway_config(),
    );
    let policy = PolicyTable::new(config.models.clone());
    let cache = Arc::new(ResponseCache::new(&config.cache_config()));

    let proxy = ChatProxy::new(gateway, policy)
        .cache(cache)
        .usage(build_usage(config)?)
        .max_capture_bytes(config.upstream.max_capture_bytes);
    Ok(proxy)
}

fn build_usage(config: &Config) -> Result<UsageTracker, HermodError> {
    let cap = config.quota.monthly_tokens;

    #[cfg(feature = "redis")]
    if let Some(url) = &config.quota.redis_url {
        info!(?cap, "usage metering enabled (redis ledger)");
        let tracker = UsageTracker::new(Arc::new(hermod::RedisLedger::new(url)?))
            .timeout(config.quota.timeout());
        return Ok(match cap {
            Some(cap) => tracker.monthly_cap(cap),
            None => tracker,
        });
    }

    match cap {
        Some(cap) => {
            info!(cap, "usage quota enabled (in-memory ledger)");
            Ok(UsageTracker::new(Arc::new(MemoryLedger::new()))
                .monthly_cap(cap)
                .timeout(config.quota.timeout()))
        }
        None => Ok(UsageTracker::disabled()),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
