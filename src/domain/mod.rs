//! Domain models
//!
//! Pass-through representations of Docker resources and the service's own
//! job/agent records. Plain data, no axum or tokio here.

pub mod agent;
pub mod container;
pub mod image;
pub mod job;
pub mod network;
pub mod stack;
pub mod system;
pub mod volume;

pub use agent::{AgentEvent, AgentInfo};
pub use container::{ContainerSummary, EnvVar};
pub use image::ImageSummary;
pub use job::{Job, JobKind, JobStage, JobStatus, LogLine, StageStatus};
pub use network::NetworkSummary;
pub use stack::{StackService, StackSummary};
pub use system::{DiskInfo, LoadAverage, SystemInfo, SystemStats};
pub use volume::VolumeSummary;
