use anyhow::Result;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, Cache};
use crate::db::Store;
use crate::models::*;

/// NetworkService keeps the interface table and its cached listing in step
pub struct NetworkService {
    store: Store,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl NetworkService {
    pub fn new(store: Store, cache: Arc<dyn Cache>, cache_ttl: Duration) -> Self {
        Self { store, cache, cache_ttl }
    }

    pub async fn get_network_interfaces(&self) -> Result<Vec<NetworkInterface>> {
        match cache::get_json(self.cache.as_ref(), cache::NETWORK_INTERFACES_KEY).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => tracing::warn!("Interface cache read failed: {}", e),
        }

        let interfaces = self.store.list_network_interfaces().await?;
        self.set_cache(&interfaces).await;
        Ok(interfaces)
    }

    /// Upsert every descriptor, then replace the cached listing with the full table
    pub async fn upsert_network_interfaces(&self, batch: &[UpsertInterfaceRequest]) -> Result<Vec<NetworkInterface>> {
        let written = try_join_all(batch.iter().map(|req| self.store.upsert_network_interface(req))).await?;

        let interfaces = self.store.list_network_interfaces().await?;
        self.set_cache(&interfaces).await;

        Ok(written)
    }

    /// identifier -> interface_id, read straight from the repository
    pub async fn interface_map(&self) -> Result<HashMap<String, i64>> {
        let interfaces = self.store.list_network_interfaces().await?;
        Ok(interfaces
            .into_iter()
            .map(|i| (i.identifier, i.interface_id))
            .collect())
    }

    async fn set_cache(&self, interfaces: &[NetworkInterface]) {
        if let Err(e) = cache::set_json(self.cache.as_ref(), cache::NETWORK_INTERFACES_KEY, interfaces, self.cache_ttl).await {
            tracing::warn!("Interface cache write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::tests::lan_interface;

    async fn setup() -> (Store, NetworkService) {
        let store = Store::in_memory().await.unwrap();
        let service = NetworkService::new(store.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(3600));
        (store, service)
    }

    #[tokio::test]
    async fn test_upsert_replaces_cached_listing() {
        let (_, service) = setup().await;
        service.upsert_network_interfaces(&[lan_interface("lan0")]).await.unwrap();
        assert_eq!(service.get_network_interfaces().await.unwrap().len(), 1);

        let written = service
            .upsert_network_interfaces(&[lan_interface("opt1")])
            .await
            .unwrap();
        assert_eq!(written.len(), 1);

        let mut identifiers: Vec<String> = service
            .get_network_interfaces()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.identifier)
            .collect();
        identifiers.sort();
        assert_eq!(identifiers, vec!["lan0", "opt1"]);
    }

    #[tokio::test]
    async fn test_read_is_cache_first() {
        let (store, service) = setup().await;
        assert!(service.get_network_interfaces().await.unwrap().is_empty());

        store.upsert_network_interface(&lan_interface("lan0")).await.unwrap();
        assert!(service.get_network_interfaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interface_map_bypasses_cache() {
        let (store, service) = setup().await;
        service.get_network_interfaces().await.unwrap();

        let lan = store.upsert_network_interface(&lan_interface("lan0")).await.unwrap();
        let map = service.interface_map().await.unwrap();
        assert_eq!(map.get("lan0"), Some(&lan.interface_id));
        assert_eq!(map.len(), 1);
    }
}
