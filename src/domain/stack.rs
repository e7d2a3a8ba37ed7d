//! Stack domain models
//!
//! A stack is one compose project managed from the configured stacks
//! directory, one subdirectory per stack.

use serde::{Deserialize, Serialize};

/// A stack discovered in the stacks directory
#[derive(Debug, Clone, Serialize)]
pub struct StackSummary {
    pub name: String,
    /// Path of the compose file, relative to the stacks directory
    pub compose_file: String,
    /// Service names parsed from the compose file
    pub services: Vec<String>,
    /// Job currently running against this stack, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_job_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StacksResponse {
    pub stacks: Vec<StackSummary>,
}

/// One row of `docker compose ps` for a stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackService {
    pub name: String,
    pub state: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StackServicesResponse {
    pub stack: String,
    pub services: Vec<StackService>,
}

/// Request body for `POST /stacks/validate`
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    /// Compose document text
    pub content: String,
    /// Extra interpolation variables, layered over the process environment
    #[serde(default)]
    pub vars: std::collections::BTreeMap<String, String>,
}
