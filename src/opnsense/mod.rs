pub mod client;
pub mod mappers;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use client::OpnSenseClient;
pub use types::{InterfacesInfoResponse, LeaseResponse};

/// The router/firewall control plane as consumed by the reconciler
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Current DHCP lease table. May be empty; rows are unordered.
    async fn lease_table(&self) -> Result<LeaseResponse>;

    /// Interface descriptors, physical and virtual
    async fn interface_info(&self) -> Result<InterfacesInfoResponse>;
}
