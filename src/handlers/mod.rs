pub mod devices;
pub mod interfaces;
pub mod scan;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::NotFoundError;
use crate::services::InvalidInputError;

/// Error response - {"error": "message"}
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Success envelope - {"success": true, "data": ...}
#[derive(Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse { success: true, data })
}

/// `?interface_id=N`, checked by hand so a missing value gets a JSON error
#[derive(Debug, Deserialize)]
pub struct InterfaceQuery {
    pub interface_id: Option<i64>,
}

impl InterfaceQuery {
    pub fn require(&self) -> Result<i64, ApiError> {
        self.interface_id
            .ok_or_else(|| ApiError::bad_request("interface_id query parameter is required"))
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "service unavailable".to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    /// Read-path mapping: caller errors keep their status, anything else
    /// becomes a bare 503 so internals stay out of the response.
    pub fn read(err: anyhow::Error) -> Self {
        let api = Self::from(err);
        if api.status == StatusCode::INTERNAL_SERVER_ERROR {
            return Self::unavailable();
        }
        api
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(nf) = err.downcast_ref::<NotFoundError>() {
            return Self::not_found(nf.to_string());
        }
        if let Some(invalid) = err.downcast_ref::<InvalidInputError>() {
            return Self::bad_request(invalid.to_string());
        }
        tracing::error!("Request failed: {:#}", err);
        Self::internal(err.to_string())
    }
}

/// Healthcheck endpoint - returns 200 OK with status
pub async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lanwatch",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
