mod devices;
mod interfaces;
pub(crate) mod row_helpers;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::models::*;

pub use devices::DeviceRepo;
pub use interfaces::InterfaceRepo;

/// Typed error for "resource not found"; enables reliable downcast
/// in the API error handler instead of fragile string matching.
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// Device persistence as seen by the device service and the reconciler.
/// `Store` is the production implementation.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Every device on the interface, whatever its status
    async fn list_devices(&self, interface_id: i64) -> Result<Vec<Device>>;

    async fn list_devices_by_status(&self, interface_id: i64, status: DeviceStatus) -> Result<Vec<Device>>;

    async fn get_device(&self, mac: &str, interface_id: i64) -> Result<Option<Device>>;

    async fn upsert_device(&self, interface_id: i64, req: &UpsertDeviceRequest) -> Result<Device>;

    /// UP (or DOWN) devices across every interface
    async fn list_all_devices_by_status(&self, status: DeviceStatus) -> Result<Vec<Device>>;

    /// Mark UP devices last seen before `cutoff` as DOWN, sparing the MACs in `keep`;
    /// returns the number swept
    async fn mark_devices_down_before(&self, interface_id: i64, cutoff: DateTime<Utc>, keep: &[String]) -> Result<u64>;

    async fn set_device_authorized(&self, mac: &str, interface_id: i64, authorized: bool) -> Result<Device>;
}

/// Store handles all database operations, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Single-connection in-memory store; the connection is never recycled
    /// so the database lives as long as the pool.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ========== Network Interface Operations ==========

    pub async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        InterfaceRepo::list(&self.pool).await
    }

    pub async fn upsert_network_interface(&self, req: &UpsertInterfaceRequest) -> Result<NetworkInterface> {
        InterfaceRepo::upsert(&self.pool, req).await
    }
}

#[async_trait]
impl DeviceRepository for Store {
    async fn list_devices(&self, interface_id: i64) -> Result<Vec<Device>> {
        DeviceRepo::list_by_interface(&self.pool, interface_id).await
    }

    async fn list_devices_by_status(&self, interface_id: i64, status: DeviceStatus) -> Result<Vec<Device>> {
        DeviceRepo::list_by_status(&self.pool, interface_id, status).await
    }

    async fn get_device(&self, mac: &str, interface_id: i64) -> Result<Option<Device>> {
        DeviceRepo::get(&self.pool, mac, interface_id).await
    }

    async fn upsert_device(&self, interface_id: i64, req: &UpsertDeviceRequest) -> Result<Device> {
        DeviceRepo::upsert(&self.pool, interface_id, req).await
    }

    async fn list_all_devices_by_status(&self, status: DeviceStatus) -> Result<Vec<Device>> {
        DeviceRepo::list_all_by_status(&self.pool, status).await
    }

    async fn mark_devices_down_before(&self, interface_id: i64, cutoff: DateTime<Utc>, keep: &[String]) -> Result<u64> {
        DeviceRepo::mark_down_before(&self.pool, interface_id, cutoff, keep).await
    }

    async fn set_device_authorized(&self, mac: &str, interface_id: i64, authorized: bool) -> Result<Device> {
        DeviceRepo::set_authorized(&self.pool, mac, interface_id, authorized).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A physical, enabled LAN-style interface descriptor
    pub fn lan_interface(identifier: &str) -> UpsertInterfaceRequest {
        UpsertInterfaceRequest {
            identifier: identifier.to_string(),
            name: identifier.to_uppercase(),
            link_type: "static".to_string(),
            ipv4: "192.168.1.1".to_string(),
            subnet: "24".to_string(),
            gateways: Vec::new(),
            routes: Vec::new(),
            status: true,
        }
    }

    #[tokio::test]
    async fn test_store_trait_round_trip() {
        let store = Store::in_memory().await.unwrap();
        let iface = store.upsert_network_interface(&lan_interface("lan0")).await.unwrap();

        let repo: &dyn DeviceRepository = &store;
        let req = UpsertDeviceRequest {
            device_mac: "aa:bb:cc:dd:ee:ff".into(),
            device_ip: "192.168.1.5".into(),
            ..Default::default()
        };
        repo.upsert_device(iface.interface_id, &req).await.unwrap();

        let found = repo.get_device("AA-BB-CC-DD-EE-FF", iface.interface_id).await.unwrap();
        assert!(found.is_some());
        assert!(repo.get_device("AA-BB-CC-DD-EE-FF", iface.interface_id + 1).await.unwrap().is_none());
    }
}
