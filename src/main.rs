use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, Level};

use turnstile::admission::{AdmissionPipeline, CounterStore, RateLimiter, SystemClock};
use turnstile::config::GatewayConfig;
use turnstile::graphql::{build_schema, field_catalog};
use turnstile::http::{serve_with_shutdown, AppState};
use turnstile::upstream::{HttpUsersClient, UsersBackend};

#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about = "GraphQL gateway for the users service")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Listen address, overriding configuration
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("Starting Turnstile GraphQL Gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    info!(
        listen_addr = %config.server.listen_addr,
        upstream = %config.upstream.users_service_url,
        "Configuration loaded"
    );

    let backend: Arc<dyn UsersBackend> = Arc::new(HttpUsersClient::new(&config.upstream)?);

    // Counter store and its sweep task live for the whole process.
    let store = Arc::new(CounterStore::new(Arc::new(SystemClock)));
    let sweeper = CounterStore::spawn_sweeper(
        store.clone(),
        Duration::from_secs(config.server.sweep_interval_secs),
    );

    let limiter = RateLimiter::new(store, config.rate_limit);
    let pipeline = Arc::new(AdmissionPipeline::new(config.analysis, limiter));

    let state = AppState {
        schema: build_schema(backend),
        pipeline,
        catalog: Arc::new(field_catalog()),
    };

    serve_with_shutdown(config.server.listen_addr, state, shutdown_signal()).await?;

    sweeper.shutdown();
    info!("Turnstile gateway stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
