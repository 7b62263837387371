use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::scanner::DeviceScanReport;
use crate::AppState;

use super::{success, DataResponse};

#[derive(Serialize)]
pub struct InterfaceScanResponse {
    pub written: usize,
}

/// Run a device reconciliation pass now. Failures inside the pass are
/// logged and show up as an empty report.
pub async fn scan_devices(State(state): State<Arc<AppState>>) -> Json<DataResponse<DeviceScanReport>> {
    success(state.scanner.scan_devices_now().await)
}

pub async fn scan_interfaces(State(state): State<Arc<AppState>>) -> Json<DataResponse<InterfaceScanResponse>> {
    let written = state.scanner.scan_interfaces_now().await;
    success(InterfaceScanResponse { written })
}
