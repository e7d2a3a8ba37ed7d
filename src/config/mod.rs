//! Configuration
//!
//! Environment variable parsing and service-wide constants.

pub mod env;

pub use env::{AgentConfig, EnvConfig};
