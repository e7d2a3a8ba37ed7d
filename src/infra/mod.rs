//! Infrastructure
//!
//! Process execution, the Docker CLI wrapper and webhook delivery.

pub mod command;
pub mod docker;
pub mod webhook;

pub use command::{CommandError, CommandResult, CommandRunner};
pub use docker::{Docker, DockerError};
pub use webhook::WebhookClient;
