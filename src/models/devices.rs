use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reachability of a device as last observed by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Up,
    Down,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Up => "UP",
            DeviceStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(DeviceStatus::Up),
            "DOWN" => Ok(DeviceStatus::Down),
            other => Err(anyhow::anyhow!("unknown device status: {}", other)),
        }
    }
}

/// Device is a host observed on one interface.
/// Identity is (device_mac, interface_id); the same MAC may appear once per interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: i64,
    pub device_mac: String,
    pub interface_id: i64,
    pub device_ip: String,
    pub device_hostname: Option<String>,
    #[serde(rename = "deviceOS")]
    pub device_os: Option<String>,
    pub mac_info: Option<String>,
    pub authorized: bool,
    pub status: DeviceStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// UpsertDeviceRequest carries the fields a lease observation (or an API caller)
/// may write. MAC and IP are required; the MAC is normalized by the repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDeviceRequest {
    #[serde(default)]
    pub device_mac: String,
    #[serde(default)]
    pub device_ip: String,
    #[serde(default)]
    pub device_hostname: Option<String>,
    #[serde(default)]
    pub mac_info: Option<String>,
}

/// A lease mapped onto a known interface, ready to upsert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCandidate {
    pub interface_id: i64,
    #[serde(flatten)]
    pub device: UpsertDeviceRequest,
}

/// Per-item outcome of a bulk upsert
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub written: Vec<Device>,
    pub failed: Vec<String>,
}
