use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::map_interface_row;

const SELECT_INTERFACE: &str = r#"
    SELECT interface_id, identifier, name, link_type, ipv4, subnet, gateways, routes,
           status, created_at, updated_at
    FROM network_interfaces
"#;

/// Network interface database operations, keyed by control-plane identifier
pub struct InterfaceRepo;

impl InterfaceRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<NetworkInterface>> {
        let rows = sqlx::query(&format!("{} ORDER BY interface_id", SELECT_INTERFACE))
            .fetch_all(pool)
            .await?;

        rows.iter().map(map_interface_row).collect()
    }

    pub async fn get_by_identifier(pool: &Pool<Sqlite>, identifier: &str) -> Result<Option<NetworkInterface>> {
        let row = sqlx::query(&format!("{} WHERE identifier = ?", SELECT_INTERFACE))
            .bind(identifier)
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(map_interface_row).transpose()
    }

    /// Insert or update by identifier. interface_id and created_at are kept on update.
    pub async fn upsert(pool: &Pool<Sqlite>, req: &UpsertInterfaceRequest) -> Result<NetworkInterface> {
        if req.identifier.trim().is_empty() {
            anyhow::bail!("Network interface must have an identifier to upsert");
        }

        let now = Utc::now();
        let name = if req.name.is_empty() { &req.identifier } else { &req.name };
        let link_type = if req.link_type.is_empty() { "static" } else { req.link_type.as_str() };

        sqlx::query(
            r#"
            INSERT INTO network_interfaces (identifier, name, link_type, ipv4, subnet, gateways, routes,
                                            status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (identifier) DO UPDATE SET
                name = excluded.name,
                link_type = excluded.link_type,
                ipv4 = excluded.ipv4,
                subnet = excluded.subnet,
                gateways = excluded.gateways,
                routes = excluded.routes,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&req.identifier)
        .bind(name)
        .bind(link_type)
        .bind(&req.ipv4)
        .bind(&req.subnet)
        .bind(serde_json::to_string(&req.gateways)?)
        .bind(serde_json::to_string(&req.routes)?)
        .bind(req.status)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to upsert interface {}", req.identifier))?;

        Self::get_by_identifier(pool, &req.identifier)
            .await?
            .context("Interface not found after upsert")
    }
}
