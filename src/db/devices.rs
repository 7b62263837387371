use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::models::*;
use crate::utils::normalize_mac;

use super::row_helpers::map_device_row;

const SELECT_DEVICE: &str = r#"
    SELECT device_id, device_mac, interface_id, device_ip, device_hostname, device_os,
           mac_info, authorized, status, first_seen, last_seen
    FROM devices
"#;

/// Device database operations. Rows are keyed by (device_mac, interface_id).
pub struct DeviceRepo;

impl DeviceRepo {
    pub async fn list_by_interface(pool: &Pool<Sqlite>, interface_id: i64) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!("{} WHERE interface_id = ? ORDER BY device_ip", SELECT_DEVICE))
            .bind(interface_id)
            .fetch_all(pool)
            .await?;

        rows.iter().map(map_device_row).collect()
    }

    pub async fn list_by_status(
        pool: &Pool<Sqlite>,
        interface_id: i64,
        status: DeviceStatus,
    ) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!(
            "{} WHERE interface_id = ? AND status = ? ORDER BY device_ip",
            SELECT_DEVICE
        ))
        .bind(interface_id)
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_device_row).collect()
    }

    pub async fn get(pool: &Pool<Sqlite>, mac: &str, interface_id: i64) -> Result<Option<Device>> {
        let row = sqlx::query(&format!("{} WHERE device_mac = ? AND interface_id = ?", SELECT_DEVICE))
            .bind(normalize_mac(mac))
            .bind(interface_id)
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(map_device_row).transpose()
    }

    /// Insert or refresh a device. A new row stamps first_seen and last_seen;
    /// an existing row keeps first_seen, authorized and device_os untouched.
    pub async fn upsert(pool: &Pool<Sqlite>, interface_id: i64, req: &UpsertDeviceRequest) -> Result<Device> {
        let mac = normalize_mac(&req.device_mac);
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO devices (device_mac, interface_id, device_ip, device_hostname, mac_info,
                                 authorized, status, first_seen, last_seen)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
            ON CONFLICT (device_mac, interface_id) DO UPDATE SET
                device_ip = excluded.device_ip,
                device_hostname = excluded.device_hostname,
                mac_info = excluded.mac_info,
                status = excluded.status,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(&mac)
        .bind(interface_id)
        .bind(&req.device_ip)
        .bind(&req.device_hostname)
        .bind(&req.mac_info)
        .bind(DeviceStatus::Up.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to upsert device {} on interface {}", mac, interface_id))?;

        Self::get(pool, &mac, interface_id)
            .await?
            .context("Device not found after upsert")
    }

    /// Every device with the given status, across all interfaces
    pub async fn list_all_by_status(pool: &Pool<Sqlite>, status: DeviceStatus) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!("{} WHERE status = ? ORDER BY interface_id, device_ip", SELECT_DEVICE))
            .bind(status.as_str())
            .fetch_all(pool)
            .await?;

        rows.iter().map(map_device_row).collect()
    }

    /// Mark every UP device on the interface last seen before `cutoff` as DOWN,
    /// except the MACs in `keep`. Rows are never deleted.
    pub async fn mark_down_before(
        pool: &Pool<Sqlite>,
        interface_id: i64,
        cutoff: DateTime<Utc>,
        keep: &[String],
    ) -> Result<u64> {
        let mut sql =
            String::from("UPDATE devices SET status = ? WHERE interface_id = ? AND status = ? AND last_seen < ?");
        if !keep.is_empty() {
            let placeholders = vec!["?"; keep.len()].join(", ");
            sql.push_str(&format!(" AND device_mac NOT IN ({})", placeholders));
        }

        let mut query = sqlx::query(&sql)
            .bind(DeviceStatus::Down.as_str())
            .bind(interface_id)
            .bind(DeviceStatus::Up.as_str())
            .bind(cutoff);
        for mac in keep {
            query = query.bind(normalize_mac(mac));
        }

        let result = query.execute(pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn set_authorized(pool: &Pool<Sqlite>, mac: &str, interface_id: i64, authorized: bool) -> Result<Device> {
        let mac = normalize_mac(mac);
        let result = sqlx::query("UPDATE devices SET authorized = ? WHERE device_mac = ? AND interface_id = ?")
            .bind(authorized)
            .bind(&mac)
            .bind(interface_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(super::NotFoundError::new("Device", &format!("{} on interface {}", mac, interface_id)).into());
        }

        Self::get(pool, &mac, interface_id)
            .await?
            .context("Device not found after update")
    }
}
