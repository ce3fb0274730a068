//! Chapterly Server - chapter performance REST API
//!
//! Loads configuration (defaults, optional TOML file, then flags and
//! environment), connects the document store and the response cache, and
//! serves the API until interrupted.

use anyhow::{Context, Result};
use chapterly_api::{ApiState, router};
use chapterly_common::ServiceConfig;
use chapterly_common::YearRange;
use chapterly_common::config::LogFormat;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "chapterly-server")]
#[command(about = "Chapterly chapter performance API")]
#[command(version)]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long, env = "CHAPTERLY_CONFIG")]
    config: Option<String>,

    /// Document store: memory:// or redb://<path>
    #[arg(long, env = "CHAPTERLY_STORE_URI")]
    store_uri: Option<String>,

    /// Response cache: memory:// or redis://host:port
    #[arg(long, env = "CHAPTERLY_CACHE_URI")]
    cache_uri: Option<String>,

    /// Shared secret for write operations
    #[arg(long, env = "CHAPTERLY_ADMIN_KEY", hide_env_values = true)]
    admin_key: Option<String>,

    /// Time-to-live of cached read responses, in seconds
    #[arg(long, env = "CHAPTERLY_CACHE_TTL_SECS")]
    cache_ttl_secs: Option<u64>,

    /// Upper bound for a single cache call, in milliseconds
    #[arg(long, env = "CHAPTERLY_CACHE_TIMEOUT_MS")]
    cache_timeout_ms: Option<u64>,

    /// Listen host
    #[arg(long, env = "CHAPTERLY_LISTEN_HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Identify clients by x-forwarded-for (only behind a trusted proxy)
    #[arg(long, env = "CHAPTERLY_TRUST_PROXY")]
    trust_proxy: Option<bool>,

    /// Requests per window for public traffic
    #[arg(long, env = "CHAPTERLY_RATE_LIMIT_PUBLIC")]
    rate_limit_public: Option<u64>,

    /// Requests per window for admin traffic
    #[arg(long, env = "CHAPTERLY_RATE_LIMIT_ADMIN")]
    rate_limit_admin: Option<u64>,

    /// Rate limit window, in seconds
    #[arg(long, env = "CHAPTERLY_RATE_WINDOW_SECS")]
    rate_window_secs: Option<u64>,

    /// Tracked years, e.g. 2019-2025
    #[arg(long, env = "CHAPTERLY_YEARS")]
    years: Option<YearRange>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: pretty or json
    #[arg(long, env = "CHAPTERLY_LOG_FORMAT")]
    log_format: Option<String>,
}

impl Args {
    /// Build the effective configuration: defaults, then the file, then
    /// flags and environment
    fn load_config(&self) -> Result<ServiceConfig> {
        let mut builder = config::Config::builder();
        if let Some(path) = &self.config {
            builder = builder.add_source(config::File::with_name(path));
        }
        let mut cfg: ServiceConfig = builder
            .build()
            .and_then(config::Config::try_deserialize::<ServiceConfig>)
            .context("Failed to load configuration")?;

        if let Some(uri) = &self.store_uri {
            cfg.store.uri.clone_from(uri);
        }
        if let Some(uri) = &self.cache_uri {
            cfg.cache.uri.clone_from(uri);
        }
        if let Some(key) = &self.admin_key {
            cfg.auth.admin_key.clone_from(key);
        }
        if let Some(ttl) = self.cache_ttl_secs {
            cfg.cache.ttl_secs = ttl;
        }
        if let Some(timeout) = self.cache_timeout_ms {
            cfg.cache.timeout_ms = timeout;
        }
        if let Some(host) = &self.host {
            cfg.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if let Some(trust) = self.trust_proxy {
            cfg.server.trust_proxy = trust;
        }
        if let Some(limit) = self.rate_limit_public {
            cfg.rate_limit.public_limit = limit;
        }
        if let Some(limit) = self.rate_limit_admin {
            cfg.rate_limit.admin_limit = limit;
        }
        if let Some(window) = self.rate_window_secs {
            cfg.rate_limit.window_secs = window;
        }
        if let Some(years) = self.years {
            cfg.records.years = years;
        }
        if let Some(level) = &self.log_level {
            cfg.logging.level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            cfg.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => anyhow::bail!("Unknown log format '{other}', expected pretty or json"),
            };
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn init_tracing(cfg: &ServiceConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| cfg.logging.level.clone().into());
    let json = cfg.logging.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = args.load_config()?;
    init_tracing(&cfg);

    info!("Starting Chapterly server");
    info!("Store: {}", cfg.store.uri);
    info!("Cache: {}", cfg.cache.uri);
    info!(
        "Rate limits: public {} / admin {} per {}s",
        cfg.rate_limit.public_limit, cfg.rate_limit.admin_limit, cfg.rate_limit.window_secs
    );

    let store = chapterly_store::connect(&cfg.store.uri).context("Failed to open document store")?;
    store
        .ping()
        .await
        .context("Document store is not reachable")?;
    let cache = chapterly_cache::connect_or_fallback(&cfg.cache.uri).await;

    let state = Arc::new(ApiState::new(&cfg, Arc::clone(&store), Arc::clone(&cache)));
    let app = router(state);

    let addr = cfg.server.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    store.close().await;
    cache.close().await;
    info!("Chapterly server stopped");
    Ok(())
}
