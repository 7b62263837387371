mod cache;
mod config;
mod db;
mod handlers;
mod models;
mod opnsense;
mod router;
mod scanner;
mod services;
mod utils;

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use db::Store;
use opnsense::OpnSenseClient;
use scanner::{Scanner, Scheduler};
use services::{DeviceService, NetworkService};

/// Application state shared across handlers
pub struct AppState {
    pub devices: Arc<DeviceService>,
    pub network: Arc<NetworkService>,
    pub scanner: Arc<Scanner>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env before reading configuration
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lanwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::load();
    tracing::info!("Starting lanwatch");
    tracing::info!("Database: {}", cfg.db_path);
    tracing::info!("Control plane: {}", cfg.opnsense_url);
    tracing::info!("Listen: {}", cfg.listen_addr);
    if cfg.opnsense_key.is_empty() || cfg.opnsense_secret.is_empty() {
        tracing::warn!("OPNSENSE_KEY/OPNSENSE_SECRET not set - control plane requests will be rejected");
    }

    let store = Store::with_pool_size(&cfg.db_path, cfg.db_max_connections).await?;
    tracing::info!("Database initialized (pool_size={})", cfg.db_max_connections);

    let cache = cache::from_config(&cfg.redis_url).await?;

    let client = OpnSenseClient::new(
        cfg.opnsense_url.clone(),
        cfg.opnsense_key.clone(),
        cfg.opnsense_secret.clone(),
        cfg.opnsense_verify_tls,
        Duration::from_secs(cfg.opnsense_timeout_secs),
    )?;

    let devices = Arc::new(DeviceService::new(
        Arc::new(store.clone()),
        cache.clone(),
        Duration::from_secs(cfg.device_cache_ttl_secs),
        Duration::from_secs(cfg.device_down_grace_secs),
        cfg.scan_concurrency,
    ));
    let network = Arc::new(NetworkService::new(
        store,
        cache,
        Duration::from_secs(cfg.interface_cache_ttl_secs),
    ));
    let scanner = Arc::new(Scanner::new(
        Arc::new(client),
        devices.clone(),
        network.clone(),
        Duration::from_secs(cfg.interface_refresh_cooldown_secs),
    ));

    // Warm up: interfaces first so the device pass can map leases
    scanner.scan_interfaces_now().await;
    scanner.scan_devices_now().await;

    let mut scheduler = Scheduler::for_scanner(
        scanner.clone(),
        cfg.device_scan_interval(),
        cfg.interface_scan_interval(),
    );
    scheduler.start();

    let state = Arc::new(AppState {
        devices,
        network,
        scanner,
    });
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("lanwatch listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    tracing::info!("lanwatch shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
