//! Runtime state

pub mod agent_registry;
pub mod app_state;
pub mod job_store;
pub mod log_hub;

pub use agent_registry::AgentRegistry;
pub use app_state::{get_shutdown_token, trigger_shutdown, AppState, QueuedJob, RunningJob};
pub use job_store::JobStore;
pub use log_hub::LogHub;
