//! Network domain models

use serde::{Deserialize, Serialize};

/// One row of `docker network ls`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
}

#[derive(Debug, Serialize)]
pub struct NetworksResponse {
    pub networks: Vec<NetworkSummary>,
}

/// Request body for creating a network
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    /// Defaults to `bridge`
    pub driver: Option<String>,
    #[serde(default)]
    pub internal: bool,
}
