use axum::{extract::State, Json};
use std::sync::Arc;

use crate::models::NetworkInterface;
use crate::AppState;

use super::{success, ApiError, DataResponse};

/// List known physical interfaces (cache-first)
pub async fn list_interfaces(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse<Vec<NetworkInterface>>>, ApiError> {
    let interfaces = state
        .network
        .get_network_interfaces()
        .await
        .map_err(ApiError::read)?;
    Ok(success(interfaces))
}
