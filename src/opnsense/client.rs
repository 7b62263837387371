use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::types::*;
use super::ControlPlane;

/// OPNsense API client (key/secret basic auth)
pub struct OpnSenseClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    client: Client,
}

impl OpnSenseClient {
    pub fn new(url: String, api_key: String, api_secret: String, verify_tls: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Helper to POST to a search endpoint and decode the JSON body
    async fn post_search<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let resp = self
            .client
            .post(self.api_url(endpoint))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("OPNsense request {} failed: {}", endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OPNsense API error {} on {}: {}", status, endpoint, body));
        }

        Ok(resp.json().await?)
    }

    // --- DHCP ---

    pub async fn search_leases(&self) -> Result<LeaseResponse> {
        self.post_search("/kea/leases4/search/").await
    }

    // --- Interfaces ---

    pub async fn interfaces_info(&self) -> Result<InterfacesInfoResponse> {
        self.post_search("/interfaces/overview/interfaces_info").await
    }
}

#[async_trait]
impl ControlPlane for OpnSenseClient {
    async fn lease_table(&self) -> Result<LeaseResponse> {
        self.search_leases().await
    }

    async fn interface_info(&self) -> Result<InterfacesInfoResponse> {
        self.interfaces_info().await
    }
}
