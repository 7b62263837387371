use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Device routes
        .route("/api/devices", get(handlers::devices::list_devices))
        .route("/api/devices", put(handlers::devices::upsert_device))
        .route("/api/devices/db", get(handlers::devices::list_devices_from_db))
        .route("/api/devices/leases", get(handlers::devices::list_lease_devices))
        .route("/api/devices/:mac", get(handlers::devices::get_device))
        .route("/api/devices/:mac/authorized", put(handlers::devices::set_device_authorized))
        // Interface routes
        .route("/api/interfaces", get(handlers::interfaces::list_interfaces))
        // On-demand scans
        .route("/api/scan/devices", post(handlers::scan::scan_devices))
        .route("/api/scan/interfaces", post(handlers::scan::scan_interfaces))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
