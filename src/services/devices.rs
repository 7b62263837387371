use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, Cache};
use crate::db::{DeviceRepository, NotFoundError};
use crate::models::*;
use crate::utils::normalize_mac;

use super::InvalidInputError;

/// DeviceService orchestrates the device repository and the per-interface
/// device cache.
///
/// The cached list under `devices:<interface_id>` holds the devices currently
/// present (status UP) on that interface. Single writes merge into it; bulk
/// writes sweep devices missing from the batch to DOWN and rebuild it from the
/// repository. Reads fall through to the repository on a miss.
pub struct DeviceService {
    repo: Arc<dyn DeviceRepository>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
    down_grace: Duration,
    concurrency: usize,
}

impl DeviceService {
    pub fn new(
        repo: Arc<dyn DeviceRepository>,
        cache: Arc<dyn Cache>,
        cache_ttl: Duration,
        down_grace: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
            down_grace,
            concurrency: concurrency.max(1),
        }
    }

    async fn devices_from_cache(&self, interface_id: i64) -> Option<Vec<Device>> {
        match cache::get_json(self.cache.as_ref(), &cache::devices_key(interface_id)).await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("Device cache read failed for interface {}: {}", interface_id, e);
                None
            }
        }
    }

    async fn set_devices_to_cache(&self, devices: &[Device], interface_id: i64) {
        let key = cache::devices_key(interface_id);
        if let Err(e) = cache::set_json(self.cache.as_ref(), &key, devices, self.cache_ttl).await {
            tracing::warn!("Device cache write failed for {}: {}", key, e);
        }
    }

    /// Store the unscoped listing written by a full reconciliation tick
    pub async fn set_all_devices_cache(&self, devices: &[Device]) {
        if let Err(e) = cache::set_json(self.cache.as_ref(), cache::ALL_DEVICES_KEY, devices, self.cache_ttl).await {
            tracing::warn!("Device cache write failed for {}: {}", cache::ALL_DEVICES_KEY, e);
        }
    }

    /// Cache-first listing of the devices present on every interface
    pub async fn get_all_devices_unscoped(&self) -> Result<Vec<Device>> {
        match cache::get_json::<Vec<Device>>(self.cache.as_ref(), cache::ALL_DEVICES_KEY).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => tracing::warn!("Device cache read failed for {}: {}", cache::ALL_DEVICES_KEY, e),
        }

        let devices = self.repo.list_all_devices_by_status(DeviceStatus::Up).await?;
        self.set_all_devices_cache(&devices).await;
        Ok(devices)
    }

    /// Cache-first listing of the devices present on an interface
    pub async fn get_all_devices(&self, interface_id: i64) -> Result<Vec<Device>> {
        if let Some(cached) = self.devices_from_cache(interface_id).await {
            return Ok(cached);
        }

        let devices = self
            .repo
            .list_devices_by_status(interface_id, DeviceStatus::Up)
            .await?;
        self.set_devices_to_cache(&devices, interface_id).await;

        Ok(devices)
    }

    /// Every device ever seen on the interface, including DOWN ones. Bypasses the cache.
    pub async fn get_all_devices_from_db(&self, interface_id: i64) -> Result<Vec<Device>> {
        self.repo.list_devices(interface_id).await
    }

    pub async fn get_device_by_mac(&self, mac: &str, interface_id: i64) -> Result<Device> {
        self.repo
            .get_device(mac, interface_id)
            .await?
            .ok_or_else(|| {
                NotFoundError::new("Device", &format!("{} on interface {}", normalize_mac(mac), interface_id)).into()
            })
    }

    /// Write one device and merge it into the cached list for its interface
    pub async fn upsert_device(&self, req: &UpsertDeviceRequest, interface_id: i64) -> Result<Device> {
        validate_upsert(req)?;

        let device = self.repo.upsert_device(interface_id, req).await?;
        self.merge_into_cache(&device).await;

        Ok(device)
    }

    /// Write a batch for one interface with bounded concurrency.
    ///
    /// Each element succeeds or fails on its own; failures are logged and left
    /// out of the cache but keep their stored status. Devices on the interface
    /// that were neither written nor failed in this batch (and are older than the
    /// grace period) are marked DOWN, then the cached list is rebuilt from the UP
    /// devices.
    pub async fn upsert_devices(&self, batch: Vec<UpsertDeviceRequest>, interface_id: i64) -> BatchOutcome {
        let started = Utc::now();
        let repo = &self.repo;

        let results: Vec<(String, Result<Device>)> = stream::iter(batch)
            .map(|req| async move {
                let result = match validate_upsert(&req) {
                    Ok(()) => repo.upsert_device(interface_id, &req).await,
                    Err(e) => Err(e),
                };
                (req.device_mac, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for (mac, result) in results {
            match result {
                Ok(device) => outcome.written.push(device),
                Err(e) => {
                    tracing::warn!("Failed to upsert device {} on interface {}: {:#}", mac, interface_id, e);
                    outcome.failed.push(mac);
                }
            }
        }

        let cutoff = started - chrono::Duration::from_std(self.down_grace).unwrap_or_else(|_| chrono::Duration::zero());
        match self
            .repo
            .mark_devices_down_before(interface_id, cutoff, &outcome.failed)
            .await
        {
            Ok(0) => {}
            Ok(swept) => tracing::info!("Marked {} devices DOWN on interface {}", swept, interface_id),
            Err(e) => tracing::warn!("Failed to sweep absent devices on interface {}: {}", interface_id, e),
        }

        let failed: HashSet<String> = outcome.failed.iter().map(|mac| normalize_mac(mac)).collect();
        let present = match self
            .repo
            .list_devices_by_status(interface_id, DeviceStatus::Up)
            .await
        {
            Ok(devices) => devices
                .into_iter()
                .filter(|d| !failed.contains(&d.device_mac))
                .collect(),
            Err(e) => {
                tracing::warn!("Falling back to written batch for interface {} cache: {}", interface_id, e);
                outcome.written.clone()
            }
        };
        self.set_devices_to_cache(&present, interface_id).await;

        outcome
    }

    /// Set the trust flag on an existing device
    pub async fn set_device_authorized(&self, mac: &str, interface_id: i64, authorized: bool) -> Result<Device> {
        let device = self
            .repo
            .set_device_authorized(mac, interface_id, authorized)
            .await?;
        self.merge_into_cache(&device).await;
        Ok(device)
    }

    /// Replace-or-append a present device in the cached list (remove it if DOWN).
    /// A missing list is left missing so the next read rebuilds it from the repository.
    async fn merge_into_cache(&self, device: &Device) {
        let Some(mut cached) = self.devices_from_cache(device.interface_id).await else {
            return;
        };

        cached.retain(|d| d.device_mac != device.device_mac);
        if device.status == DeviceStatus::Up {
            cached.push(device.clone());
        }
        self.set_devices_to_cache(&cached, device.interface_id).await;
    }
}

fn validate_upsert(req: &UpsertDeviceRequest) -> Result<()> {
    if req.device_mac.trim().is_empty() || req.device_ip.trim().is_empty() {
        return Err(InvalidInputError::new("deviceMac and deviceIp are required to upsert a device").into());
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::Store;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Wraps a real store and fails upserts for chosen MACs
    pub struct FlakyRepo {
        pub inner: Store,
        pub failing: Mutex<HashSet<String>>,
    }

    impl FlakyRepo {
        pub fn new(inner: Store) -> Self {
            Self {
                inner,
                failing: Mutex::new(HashSet::new()),
            }
        }

        pub fn fail_on(&self, mac: &str) {
            self.failing.lock().unwrap().insert(normalize_mac(mac));
        }
    }

    #[async_trait]
    impl DeviceRepository for FlakyRepo {
        async fn list_devices(&self, interface_id: i64) -> Result<Vec<Device>> {
            self.inner.list_devices(interface_id).await
        }

        async fn list_devices_by_status(&self, interface_id: i64, status: DeviceStatus) -> Result<Vec<Device>> {
            self.inner.list_devices_by_status(interface_id, status).await
        }

        async fn get_device(&self, mac: &str, interface_id: i64) -> Result<Option<Device>> {
            self.inner.get_device(mac, interface_id).await
        }

        async fn upsert_device(&self, interface_id: i64, req: &UpsertDeviceRequest) -> Result<Device> {
            if self.failing.lock().unwrap().contains(&normalize_mac(&req.device_mac)) {
                anyhow::bail!("injected failure for {}", req.device_mac);
            }
            self.inner.upsert_device(interface_id, req).await
        }

        async fn list_all_devices_by_status(&self, status: DeviceStatus) -> Result<Vec<Device>> {
            self.inner.list_all_devices_by_status(status).await
        }

        async fn mark_devices_down_before(&self, interface_id: i64, cutoff: DateTime<Utc>, keep: &[String]) -> Result<u64> {
            self.inner.mark_devices_down_before(interface_id, cutoff, keep).await
        }

        async fn set_device_authorized(&self, mac: &str, interface_id: i64, authorized: bool) -> Result<Device> {
            self.inner.set_device_authorized(mac, interface_id, authorized).await
        }
    }

    pub fn request(mac: &str, ip: &str) -> UpsertDeviceRequest {
        UpsertDeviceRequest {
            device_mac: mac.to_string(),
            device_ip: ip.to_string(),
            device_hostname: None,
            mac_info: None,
        }
    }

    async fn setup() -> (Arc<FlakyRepo>, Arc<MemoryCache>, DeviceService, i64) {
        let store = Store::in_memory().await.unwrap();
        let iface = store
            .upsert_network_interface(&crate::db::tests::lan_interface("lan0"))
            .await
            .unwrap();
        let repo = Arc::new(FlakyRepo::new(store));
        let cache = Arc::new(MemoryCache::new());
        let service = DeviceService::new(repo.clone(), cache.clone(), Duration::from_secs(60), Duration::ZERO, 4);
        (repo, cache, service, iface.interface_id)
    }

    fn macs(devices: &[Device]) -> Vec<String> {
        let mut macs: Vec<String> = devices.iter().map(|d| d.device_mac.clone()).collect();
        macs.sort();
        macs
    }

    #[tokio::test]
    async fn test_upsert_requires_mac_and_ip() {
        let (_, _, service, iface) = setup().await;

        for req in [request("", "192.168.1.5"), request("aa:bb:cc:dd:ee:ff", " ")] {
            let err = service.upsert_device(&req, iface).await.unwrap_err();
            assert!(err.downcast_ref::<InvalidInputError>().is_some());
        }
        assert!(service.get_all_devices_from_db(iface).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_all_devices_reads_through_and_populates_cache() {
        let (repo, cache, service, iface) = setup().await;
        repo.inner.upsert_device(iface, &request("aa:bb:cc:dd:ee:01", "192.168.1.1")).await.unwrap();

        let devices = service.get_all_devices(iface).await.unwrap();
        assert_eq!(devices.len(), 1);

        let cached: Vec<Device> = cache::get_json(cache.as_ref(), &cache::devices_key(iface)).await.unwrap().unwrap();
        assert_eq!(cached, devices);
    }

    #[tokio::test]
    async fn test_cache_hit_is_returned_unmodified() {
        let (repo, _, service, iface) = setup().await;
        service.get_all_devices(iface).await.unwrap();

        // Written behind the cache's back: invisible until the TTL lapses
        repo.inner.upsert_device(iface, &request("aa:bb:cc:dd:ee:01", "192.168.1.1")).await.unwrap();
        assert!(service.get_all_devices(iface).await.unwrap().is_empty());
        assert_eq!(service.get_all_devices_from_db(iface).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_upsert_merges_into_cached_list() {
        let (_, _, service, iface) = setup().await;
        service.upsert_devices(vec![request("aa:bb:cc:dd:ee:01", "192.168.1.1")], iface).await;

        service.upsert_device(&request("aa:bb:cc:dd:ee:02", "192.168.1.2"), iface).await.unwrap();
        service.upsert_device(&request("aa-bb-cc-dd-ee-01", "192.168.1.9"), iface).await.unwrap();

        let cached = service.get_all_devices(iface).await.unwrap();
        assert_eq!(macs(&cached), vec!["AA:BB:CC:DD:EE:01", "AA:BB:CC:DD:EE:02"]);
        let moved = cached.iter().find(|d| d.device_mac == "AA:BB:CC:DD:EE:01").unwrap();
        assert_eq!(moved.device_ip, "192.168.1.9");
    }

    #[tokio::test]
    async fn test_single_upsert_on_cold_cache_leaves_it_cold() {
        let (_, cache, service, iface) = setup().await;
        service.upsert_device(&request("aa:bb:cc:dd:ee:01", "192.168.1.1"), iface).await.unwrap();

        assert!(cache.get(&cache::devices_key(iface)).await.unwrap().is_none());
        assert_eq!(service.get_all_devices(iface).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let (repo, _, service, iface) = setup().await;
        repo.fail_on("aa:bb:cc:dd:ee:02");

        let batch = vec![
            request("aa:bb:cc:dd:ee:01", "192.168.1.1"),
            request("aa:bb:cc:dd:ee:02", "192.168.1.2"),
            request("aa:bb:cc:dd:ee:03", "192.168.1.3"),
            request("", "192.168.1.4"),
        ];
        let outcome = service.upsert_devices(batch, iface).await;

        assert_eq!(outcome.written.len(), 2);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(service.get_all_devices_from_db(iface).await.unwrap().len(), 2);
        assert_eq!(
            macs(&service.get_all_devices(iface).await.unwrap()),
            vec!["AA:BB:CC:DD:EE:01", "AA:BB:CC:DD:EE:03"]
        );
    }

    #[tokio::test]
    async fn test_batch_sweeps_devices_missing_from_newer_batch() {
        let (_, _, service, iface) = setup().await;
        service
            .upsert_devices(
                vec![
                    request("aa:bb:cc:dd:ee:01", "192.168.1.1"),
                    request("aa:bb:cc:dd:ee:02", "192.168.1.2"),
                ],
                iface,
            )
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        service
            .upsert_devices(vec![request("aa:bb:cc:dd:ee:01", "192.168.1.1")], iface)
            .await;

        assert_eq!(macs(&service.get_all_devices(iface).await.unwrap()), vec!["AA:BB:CC:DD:EE:01"]);

        let gone = service.get_device_by_mac("aa:bb:cc:dd:ee:02", iface).await.unwrap();
        assert_eq!(gone.status, DeviceStatus::Down);

        // Seen again: back to UP with its original first_seen
        service.upsert_device(&request("aa:bb:cc:dd:ee:02", "192.168.1.2"), iface).await.unwrap();
        let back = service.get_device_by_mac("aa:bb:cc:dd:ee:02", iface).await.unwrap();
        assert_eq!(back.status, DeviceStatus::Up);
        assert_eq!(back.first_seen, gone.first_seen);
        assert_eq!(service.get_all_devices(iface).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_grace_period_keeps_recent_devices_present() {
        let store = Store::in_memory().await.unwrap();
        let iface = store
            .upsert_network_interface(&crate::db::tests::lan_interface("lan0"))
            .await
            .unwrap()
            .interface_id;
        let cache = Arc::new(MemoryCache::new());
        let service = DeviceService::new(Arc::new(store), cache, Duration::from_secs(60), Duration::from_secs(600), 4);

        service.upsert_devices(vec![request("aa:bb:cc:dd:ee:01", "192.168.1.1")], iface).await;
        service.upsert_devices(Vec::new(), iface).await;

        assert_eq!(service.get_all_devices(iface).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_device_by_mac_not_found() {
        let (_, _, service, iface) = setup().await;
        let err = service.get_device_by_mac("aa:bb:cc:dd:ee:ff", iface).await.unwrap_err();
        assert!(err.downcast_ref::<NotFoundError>().is_some());
    }

    #[tokio::test]
    async fn test_set_authorized_updates_cached_entry() {
        let (_, _, service, iface) = setup().await;
        service.upsert_devices(vec![request("aa:bb:cc:dd:ee:01", "192.168.1.1")], iface).await;

        service.set_device_authorized("AABBCCDDEE01", iface, true).await.unwrap();

        let cached = service.get_all_devices(iface).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert!(cached[0].authorized);
    }

    #[tokio::test]
    async fn test_failed_upsert_keeps_device_up_but_out_of_cache() {
        let (repo, _, service, iface) = setup().await;
        let batch = || {
            vec![
                request("aa:bb:cc:dd:ee:01", "192.168.1.1"),
                request("aa:bb:cc:dd:ee:02", "192.168.1.2"),
            ]
        };
        service.upsert_devices(batch(), iface).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        repo.fail_on("aa:bb:cc:dd:ee:02");
        let outcome = service.upsert_devices(batch(), iface).await;
        assert_eq!(outcome.failed, vec!["aa:bb:cc:dd:ee:02".to_string()]);

        let still_there = service.get_device_by_mac("aa:bb:cc:dd:ee:02", iface).await.unwrap();
        assert_eq!(still_there.status, DeviceStatus::Up);
        assert_eq!(macs(&service.get_all_devices(iface).await.unwrap()), vec!["AA:BB:CC:DD:EE:01"]);
    }

    #[tokio::test]
    async fn test_get_all_devices_falls_through_after_ttl() {
        let (repo, _, service, iface) = setup().await;
        assert!(service.get_all_devices(iface).await.unwrap().is_empty());

        repo.inner.upsert_device(iface, &request("aa:bb:cc:dd:ee:01", "192.168.1.1")).await.unwrap();
        assert!(service.get_all_devices(iface).await.unwrap().is_empty());

        // Only the cache clock moves; SQLite I/O runs with the clock resumed
        tokio::time::pause();
        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::time::resume();

        let devices = service.get_all_devices(iface).await.unwrap();
        assert_eq!(macs(&devices), vec!["AA:BB:CC:DD:EE:01"]);
    }

    #[tokio::test]
    async fn test_unscoped_listing_reads_through_then_serves_cache() {
        let store = Store::in_memory().await.unwrap();
        let lan = store.upsert_network_interface(&crate::db::tests::lan_interface("lan0")).await.unwrap();
        let opt = store.upsert_network_interface(&crate::db::tests::lan_interface("opt1")).await.unwrap();
        let service = DeviceService::new(
            Arc::new(store.clone()),
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
            Duration::ZERO,
            4,
        );
        store.upsert_device(lan.interface_id, &request("aa:bb:cc:dd:ee:01", "192.168.1.1")).await.unwrap();
        store.upsert_device(opt.interface_id, &request("aa:bb:cc:dd:ee:02", "10.0.0.2")).await.unwrap();

        let all = service.get_all_devices_unscoped().await.unwrap();
        assert_eq!(macs(&all), vec!["AA:BB:CC:DD:EE:01", "AA:BB:CC:DD:EE:02"]);

        store.upsert_device(opt.interface_id, &request("aa:bb:cc:dd:ee:03", "10.0.0.3")).await.unwrap();
        assert_eq!(service.get_all_devices_unscoped().await.unwrap().len(), 2);

        service.set_all_devices_cache(&all[..1]).await;
        assert_eq!(service.get_all_devices_unscoped().await.unwrap().len(), 1);
    }
}
