use serde::{Deserialize, Deserializer, Serialize};

// --- OPNsense API types ---

/// Search envelope returned by the OPNsense grid endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default)]
    pub total: i64,
    #[serde(default, rename = "rowCount")]
    pub row_count: i64,
    #[serde(default)]
    pub rows: Vec<T>,
}

/// One row of `/api/kea/leases4/search/`. Not assumed sorted; the same
/// hwaddr may appear on several interfaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpnLease {
    #[serde(default)]
    pub hwaddr: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub mac_info: Option<String>,
    /// Identifier of the owning interface (e.g. "lan", "opt1")
    #[serde(default)]
    pub if_name: String,
    #[serde(default)]
    pub if_descr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpnInterfaceConfig {
    #[serde(default, deserialize_with = "string_or_number")]
    pub subnet: Option<String>,
}

/// One row of `/api/interfaces/overview/interfaces_info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpnInterface {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link_type: Option<String>,
    #[serde(default)]
    pub addr4: Option<String>,
    #[serde(default)]
    pub config: Option<OpnInterfaceConfig>,
    #[serde(default)]
    pub gateways: Option<Vec<String>>,
    #[serde(default)]
    pub routes: Option<Vec<String>>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub is_physical: Option<bool>,
}

pub type LeaseResponse = SearchResponse<OpnLease>;
pub type InterfacesInfoResponse = SearchResponse<OpnInterface>;

/// OPNsense is inconsistent about quoting numeric config values
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
