//! Volume domain models

use serde::{Deserialize, Serialize};

/// One row of `docker volume ls`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub name: String,
    pub driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VolumesResponse {
    pub volumes: Vec<VolumeSummary>,
}

/// Request body for creating a volume
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    /// Defaults to `local`
    pub driver: Option<String>,
}
