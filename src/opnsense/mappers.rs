//! Pure translation of control-plane payloads into domain upsert requests.

use std::collections::HashMap;

use crate::models::{DeviceCandidate, UpsertDeviceRequest, UpsertInterfaceRequest};
use crate::utils::{is_usable_ip, none_if_blank};

use super::types::{OpnInterface, OpnLease};

/// Result of mapping a lease table against an identifier -> interface_id map
#[derive(Debug, Default)]
pub struct LeaseMapping {
    pub candidates: Vec<DeviceCandidate>,
    /// Leases whose interface identifier is not (yet) known
    pub unmapped: Vec<OpnLease>,
    /// Leases without a usable address or hardware address
    pub discarded: usize,
}

/// Map leases to device candidates. Unknown interfaces are set aside in
/// `unmapped`; leases without a hardware address or a parseable IP are dropped.
pub fn map_leases_to_devices(rows: &[OpnLease], interface_map: &HashMap<String, i64>) -> LeaseMapping {
    let mut mapping = LeaseMapping::default();

    for lease in rows {
        let Some(&interface_id) = interface_map.get(&lease.if_name) else {
            mapping.unmapped.push(lease.clone());
            continue;
        };

        if lease.hwaddr.trim().is_empty() || !is_usable_ip(&lease.address) {
            mapping.discarded += 1;
            continue;
        }

        mapping.candidates.push(DeviceCandidate {
            interface_id,
            device: UpsertDeviceRequest {
                device_mac: lease.hwaddr.clone(),
                device_ip: lease.address.trim().to_string(),
                device_hostname: none_if_blank(lease.hostname.clone()),
                mac_info: none_if_blank(lease.mac_info.clone()),
            },
        });
    }

    mapping
}

/// Keep physical interfaces with an identifier and fill in defaults
pub fn map_interfaces(rows: &[OpnInterface]) -> Vec<UpsertInterfaceRequest> {
    rows.iter()
        .filter(|iface| iface.is_physical.unwrap_or(false) && !iface.identifier.trim().is_empty())
        .map(|iface| UpsertInterfaceRequest {
            identifier: iface.identifier.clone(),
            name: none_if_blank(iface.description.clone()).unwrap_or_else(|| iface.identifier.clone()),
            link_type: none_if_blank(iface.link_type.clone()).unwrap_or_else(|| "static".to_string()),
            ipv4: iface.addr4.clone().unwrap_or_default(),
            subnet: iface
                .config
                .as_ref()
                .and_then(|c| c.subnet.clone())
                .unwrap_or_default(),
            gateways: iface.gateways.clone().unwrap_or_default(),
            routes: iface.routes.clone().unwrap_or_default(),
            status: iface.enabled.unwrap_or(false),
        })
        .collect()
}
