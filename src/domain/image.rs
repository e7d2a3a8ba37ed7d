//! Image domain models

use serde::{Deserialize, Serialize};

/// One row of `docker images`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: String,
    pub created: String,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageSummary>,
}

/// Request body for pulling an image
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// Image reference, e.g. `ghcr.io/org/app:latest`
    pub image: String,
}
