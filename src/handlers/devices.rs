use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{success, ApiError, DataResponse, InterfaceQuery};

/// Body of `PUT /api/devices`: the device fields plus the owning interface
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDeviceBody {
    #[serde(alias = "interface_id")]
    pub interface_id: Option<i64>,
    #[serde(flatten)]
    pub device: UpsertDeviceRequest,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizedBody {
    pub authorized: bool,
}

/// Devices currently present (cache-first): on one interface when
/// `interface_id` is given, on every interface otherwise
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InterfaceQuery>,
) -> Result<Json<DataResponse<Vec<Device>>>, ApiError> {
    let devices = match query.interface_id {
        Some(interface_id) => state.devices.get_all_devices(interface_id).await,
        None => state.devices.get_all_devices_unscoped().await,
    }
    .map_err(ApiError::read)?;
    Ok(success(devices))
}

/// Every stored device on an interface, including DOWN ones
pub async fn list_devices_from_db(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InterfaceQuery>,
) -> Result<Json<DataResponse<Vec<Device>>>, ApiError> {
    let interface_id = query.require()?;
    let devices = state
        .devices
        .get_all_devices_from_db(interface_id)
        .await
        .map_err(ApiError::read)?;
    Ok(success(devices))
}

/// Live lease table mapped to candidate devices; nothing is persisted
pub async fn list_lease_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse<Vec<DeviceCandidate>>>, ApiError> {
    let candidates = state
        .scanner
        .get_devices_from_dhcp_lease()
        .await
        .map_err(ApiError::read)?;
    Ok(success(candidates))
}

pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    Query(query): Query<InterfaceQuery>,
) -> Result<Json<DataResponse<Device>>, ApiError> {
    let interface_id = query.require()?;
    let device = state
        .devices
        .get_device_by_mac(&mac, interface_id)
        .await
        .map_err(ApiError::read)?;
    Ok(success(device))
}

pub async fn upsert_device(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpsertDeviceBody>,
) -> Result<Json<DataResponse<Device>>, ApiError> {
    let interface_id = body
        .interface_id
        .ok_or_else(|| ApiError::bad_request("interfaceId is required"))?;
    let device = state.devices.upsert_device(&body.device, interface_id).await?;
    Ok(success(device))
}

pub async fn set_device_authorized(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    Query(query): Query<InterfaceQuery>,
    Json(body): Json<AuthorizedBody>,
) -> Result<Json<DataResponse<Device>>, ApiError> {
    let interface_id = query.require()?;
    let device = state
        .devices
        .set_device_authorized(&mac, interface_id, body.authorized)
        .await?;
    Ok(success(device))
}
