//! Compose file handling
//!
//! Parsing, validation and normalization of docker-compose documents.
//! The raw serde types in `spec` accept the loose shapes compose allows
//! (string-or-list commands, map-or-list environment, short or long port
//! syntax); `normalize` folds them into one canonical representation and
//! `graph` resolves service start order from `depends_on`.

pub mod graph;
pub mod interpolate;
pub mod normalize;
pub mod spec;

use std::collections::BTreeMap;

use thiserror::Error;

pub use graph::deploy_order;
pub use interpolate::interpolate;
pub use normalize::{
    MountKind, NormalizedCompose, NormalizedHealthcheck, NormalizedService, PortMapping,
    VolumeMount,
};
pub use spec::{ComposeFile, Healthcheck, Service};

/// Errors raised while parsing or normalizing a compose document
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("compose file defines no services")]
    NoServices,

    #[error("invalid service name '{0}'")]
    InvalidServiceName(String),

    #[error("service '{service}' depends on unknown service '{dependency}'")]
    UnknownDependency { service: String, dependency: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("invalid port spec '{0}'")]
    InvalidPort(String),

    #[error("invalid volume spec '{0}'")]
    InvalidVolume(String),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("invalid healthcheck for service '{service}': {reason}")]
    InvalidHealthcheck { service: String, reason: String },
}

/// Parse a raw compose document without interpolation or normalization
pub fn parse(text: &str) -> Result<ComposeFile, ComposeError> {
    let file: ComposeFile = serde_yaml::from_str(text)?;
    if file.services.is_empty() {
        return Err(ComposeError::NoServices);
    }
    Ok(file)
}

/// Interpolate variables, parse and normalize a compose document
///
/// This is the entry point used by the stacks API: `vars` is typically the
/// process environment plus any per-stack overrides.
pub fn load(text: &str, vars: &BTreeMap<String, String>) -> Result<NormalizedCompose, ComposeError> {
    let interpolated = interpolate(text, vars);
    let file = parse(&interpolated)?;
    normalize::normalize_file(file, vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty_services() {
        let err = parse("services: {}\n").unwrap_err();
        assert!(matches!(err, ComposeError::NoServices));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse(": : :").is_err());
    }

    #[test]
    fn test_load_end_to_end() {
        let text = r#"
services:
  web:
    image: nginx:${TAG:-latest}
    ports:
      - "8080:80"
    depends_on:
      - db
  db:
    image: postgres:16
    environment:
      POSTGRES_PASSWORD: secret
"#;
        let compose = load(text, &BTreeMap::new()).unwrap();
        assert_eq!(compose.deploy_order, vec!["db", "web"]);
        assert_eq!(
            compose.services["web"].image.as_deref(),
            Some("nginx:latest")
        );
        assert_eq!(compose.services["web"].ports[0].target, 80);
    }
}
