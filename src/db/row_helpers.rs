use anyhow::Result;
use sqlx::{Row, sqlite::SqliteRow};

use crate::models::*;

/// Filter empty strings to None; used when DB stores '' instead of NULL
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

/// Map a SQLite row to a Device struct
pub fn map_device_row(row: &SqliteRow) -> Result<Device> {
    let status: String = row.try_get("status")?;
    Ok(Device {
        device_id: row.try_get("device_id")?,
        device_mac: row.try_get("device_mac")?,
        interface_id: row.try_get("interface_id")?,
        device_ip: row.try_get("device_ip")?,
        device_hostname: none_if_empty(row.try_get("device_hostname")?),
        device_os: none_if_empty(row.try_get("device_os")?),
        mac_info: none_if_empty(row.try_get("mac_info")?),
        authorized: row.try_get("authorized")?,
        status: status.parse()?,
        first_seen: row.try_get("first_seen")?,
        last_seen: row.try_get("last_seen")?,
    })
}

/// Map a SQLite row to a NetworkInterface struct (gateways/routes stored as JSON arrays)
pub fn map_interface_row(row: &SqliteRow) -> Result<NetworkInterface> {
    let gateways_json: String = row.try_get("gateways")?;
    let routes_json: String = row.try_get("routes")?;
    Ok(NetworkInterface {
        interface_id: row.try_get("interface_id")?,
        identifier: row.try_get("identifier")?,
        name: row.try_get("name")?,
        link_type: row.try_get("link_type")?,
        ipv4: row.try_get("ipv4")?,
        subnet: row.try_get("subnet")?,
        gateways: serde_json::from_str(&gateways_json).unwrap_or_default(),
        routes: serde_json::from_str(&routes_json).unwrap_or_default(),
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
