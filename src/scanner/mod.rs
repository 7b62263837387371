//! Reconciliation of the control plane's view into the repository and cache.

mod scheduler;

pub use scheduler::Scheduler;

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::*;
use crate::opnsense::mappers::{map_interfaces, map_leases_to_devices, LeaseMapping};
use crate::opnsense::ControlPlane;
use crate::services::{DeviceService, NetworkService};

/// Summary of one device reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceScanReport {
    /// Rows in the lease table
    pub leases: usize,
    /// Leases whose interface is still unknown after any refresh
    pub dropped: usize,
    /// Leases without a usable hardware address or IP
    pub discarded: usize,
    pub written: usize,
    pub failed: usize,
}

pub struct Scanner {
    control_plane: Arc<dyn ControlPlane>,
    devices: Arc<DeviceService>,
    network: Arc<NetworkService>,
    refresh_cooldown: Duration,
    last_interface_refresh: Mutex<Option<Instant>>,
}

impl Scanner {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        devices: Arc<DeviceService>,
        network: Arc<NetworkService>,
        refresh_cooldown: Duration,
    ) -> Self {
        Self {
            control_plane,
            devices,
            network,
            refresh_cooldown,
            last_interface_refresh: Mutex::new(None),
        }
    }

    /// Pull interface descriptors and upsert the physical ones.
    /// Failures are logged; the return value is the number written.
    pub async fn scan_interfaces_now(&self) -> usize {
        match self.refresh_interfaces().await {
            Ok(count) => {
                tracing::info!("Interface scan wrote {} interfaces", count);
                count
            }
            Err(e) => {
                tracing::warn!("Interface scan failed: {:#}", e);
                0
            }
        }
    }

    /// Pull the lease table and reconcile every known interface's device set.
    /// Failures are logged and reported as an empty pass.
    pub async fn scan_devices_now(&self) -> DeviceScanReport {
        match self.reconcile_devices().await {
            Ok(report) => {
                tracing::info!(
                    "Device scan: {} leases, {} written, {} failed, {} dropped, {} discarded",
                    report.leases,
                    report.written,
                    report.failed,
                    report.dropped,
                    report.discarded
                );
                report
            }
            Err(e) => {
                tracing::warn!("Device scan failed: {:#}", e);
                DeviceScanReport::default()
            }
        }
    }

    /// Map the live lease table onto known interfaces without writing anything
    pub async fn get_devices_from_dhcp_lease(&self) -> Result<Vec<DeviceCandidate>> {
        let interface_map = self.network.interface_map().await?;
        let leases = self.control_plane.lease_table().await?;
        Ok(map_leases_to_devices(&leases.rows, &interface_map).candidates)
    }

    async fn refresh_interfaces(&self) -> Result<usize> {
        self.mark_interface_refresh();

        let info = self.control_plane.interface_info().await?;
        let batch = map_interfaces(&info.rows);
        let written = self.network.upsert_network_interfaces(&batch).await?;
        Ok(written.len())
    }

    fn mark_interface_refresh(&self) {
        if let Ok(mut last) = self.last_interface_refresh.lock() {
            *last = Some(Instant::now());
        }
    }

    fn interface_refresh_allowed(&self) -> bool {
        match self.last_interface_refresh.lock() {
            Ok(last) => last.map_or(true, |at| at.elapsed() >= self.refresh_cooldown),
            Err(_) => false,
        }
    }

    async fn reconcile_devices(&self) -> Result<DeviceScanReport> {
        let mut interface_map = self.network.interface_map().await?;
        let leases = self.control_plane.lease_table().await?;
        let mut mapping = map_leases_to_devices(&leases.rows, &interface_map);

        if !mapping.unmapped.is_empty() && self.interface_refresh_allowed() {
            tracing::info!(
                "{} leases reference unknown interfaces, refreshing interfaces",
                mapping.unmapped.len()
            );
            match self.refresh_interfaces().await {
                Ok(_) => {
                    interface_map = self.network.interface_map().await?;
                    let retry = map_leases_to_devices(&mapping.unmapped, &interface_map);
                    mapping = LeaseMapping {
                        candidates: mapping.candidates.into_iter().chain(retry.candidates).collect(),
                        unmapped: retry.unmapped,
                        discarded: mapping.discarded + retry.discarded,
                    };
                }
                Err(e) => tracing::warn!("On-demand interface refresh failed: {:#}", e),
            }
        }

        for lease in &mapping.unmapped {
            tracing::warn!(
                "Dropping lease {} ({}): no interface mapping for {}",
                lease.hwaddr,
                lease.address,
                lease.if_name
            );
        }

        // Every known interface gets a batch, even an empty one, so absent devices are swept
        let mut batches: HashMap<i64, Vec<UpsertDeviceRequest>> =
            interface_map.values().map(|&id| (id, Vec::new())).collect();
        for candidate in mapping.candidates {
            batches.entry(candidate.interface_id).or_default().push(candidate.device);
        }

        let outcomes = join_all(
            batches
                .into_iter()
                .map(|(interface_id, batch)| self.devices.upsert_devices(batch, interface_id)),
        )
        .await;

        let mut report = DeviceScanReport {
            leases: leases.rows.len(),
            dropped: mapping.unmapped.len(),
            discarded: mapping.discarded,
            ..Default::default()
        };
        // Duplicate leases for one (MAC, interface) land on the same row
        let mut seen = HashSet::new();
        let mut written = Vec::new();
        for outcome in outcomes {
            report.failed += outcome.failed.len();
            written.extend(
                outcome
                    .written
                    .into_iter()
                    .filter(|d| seen.insert((d.device_mac.clone(), d.interface_id))),
            );
        }
        report.written = written.len();

        self.devices.set_all_devices_cache(&written).await;

        Ok(report)
    }
}
