//! Background services

pub mod agent_link;
pub mod cleaner;
pub mod jobs;
