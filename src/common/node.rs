use serde::{Deserialize, Serialize};

/// Body of `GET /slurm/{version}/nodes/`.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct NodeInfoResponse {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ApiWarning>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub hostname: String,
    /// The first entry is the authoritative state.
    #[serde(default)]
    pub state: Vec<String>,
    #[serde(default)]
    pub partitions: Vec<String>,
}

impl Node {
    /// Address used for scraping, falling back to the hostname when slurmrestd reports no
    /// address.
    pub fn target_host(&self) -> &str {
        if self.address.is_empty() {
            &self.hostname
        } else {
            &self.address
        }
    }

    pub fn primary_state(&self) -> &str {
        self.state.first().map(String::as_str).unwrap_or("unknown")
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct TimeValue {
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub set: bool,
    #[serde(default)]
    pub infinite: bool,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Meta {
    #[serde(default)]
    pub slurm: Option<SlurmInfo>,
    #[serde(default)]
    pub plugin: Option<PluginInfo>,
    #[serde(default)]
    pub client: Option<ClientInfo>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct SlurmInfo {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub version: Option<VersionInfo>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct VersionInfo {
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub minor: String,
    #[serde(default)]
    pub micro: String,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct PluginInfo {
    #[serde(default)]
    pub accounting_storage: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub plugin_type: String,
    #[serde(default)]
    pub data_parser: String,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ClientInfo {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ApiError {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_number: i64,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ApiWarning {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
}
