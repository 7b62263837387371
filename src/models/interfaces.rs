use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// NetworkInterface is a physical port reported by the control plane.
/// `identifier` is stable across scans; `interface_id` is assigned on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub interface_id: i64,
    pub identifier: String,
    pub name: String,
    pub link_type: String,
    pub ipv4: String,
    pub subnet: String,
    pub gateways: Vec<String>,
    pub routes: Vec<String>,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UpsertInterfaceRequest is a mapped interface descriptor keyed by identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertInterfaceRequest {
    pub identifier: String,
    pub name: String,
    pub link_type: String,
    pub ipv4: String,
    pub subnet: String,
    #[serde(default)]
    pub gateways: Vec<String>,
    #[serde(default)]
    pub routes: Vec<String>,
    pub status: bool,
}
