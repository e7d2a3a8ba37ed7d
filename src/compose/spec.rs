//! Raw compose document types
//!
//! These mirror the on-disk YAML as loosely as compose itself accepts it.
//! Fields that allow more than one shape (string or list, list or map) are
//! untagged enums; `normalize` turns them into a single canonical form.

use std::collections::BTreeMap;

use serde::Deserialize;

/// A parsed but not yet normalized compose document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeFile {
    /// Legacy `version` key, accepted and ignored
    pub version: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    #[serde(default)]
    pub networks: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub volumes: BTreeMap<String, serde_yaml::Value>,
}

/// A single service entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Service {
    pub image: Option<String>,
    pub container_name: Option<String>,
    pub command: Option<StringOrList>,
    pub entrypoint: Option<StringOrList>,
    pub environment: Option<ListOrMap>,
    pub labels: Option<ListOrMap>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    pub depends_on: Option<DependsOn>,
    pub healthcheck: Option<Healthcheck>,
    pub restart: Option<String>,
    pub networks: Option<ServiceNetworks>,
}

/// `command: echo hi` or `command: ["echo", "hi"]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    String(String),
    List(Vec<String>),
}

impl StringOrList {
    /// Flatten to an argument list, splitting strings on whitespace
    pub fn to_args(&self) -> Vec<String> {
        match self {
            StringOrList::String(s) => s.split_whitespace().map(str::to_string).collect(),
            StringOrList::List(items) => items.clone(),
        }
    }
}

/// `environment`/`labels` accept both `["K=V"]` and `{K: V}` shapes
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListOrMap {
    List(Vec<String>),
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
}

/// `depends_on` as a bare list or a map with per-dependency conditions
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, DependsOnDetail>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependsOnDetail {
    #[serde(default = "default_condition")]
    pub condition: String,
}

fn default_condition() -> String {
    "service_started".to_string()
}

/// A port entry: bare number, short string syntax or the long map form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Number(u16),
    String(String),
    Long(PortLong),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortLong {
    pub target: u16,
    pub published: Option<NumberOrString>,
    pub protocol: Option<String>,
    pub host_ip: Option<String>,
}

/// YAML scalars that may arrive as either a number or a quoted string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            NumberOrString::Number(n) => u16::try_from(*n).ok(),
            NumberOrString::String(s) => s.parse().ok(),
        }
    }
}

/// A volume entry: short `src:dst:opts` string or the long map form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VolumeSpec {
    String(String),
    Long(VolumeLong),
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeLong {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub source: Option<String>,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Healthcheck block, durations may be numbers (seconds) or suffixed strings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Healthcheck {
    pub test: Option<HealthTest>,
    pub interval: Option<DurationValue>,
    pub timeout: Option<DurationValue>,
    pub start_period: Option<DurationValue>,
    pub retries: Option<u32>,
    #[serde(default)]
    pub disable: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HealthTest {
    Command(String),
    Argv(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Number(f64),
    String(String),
}

/// Service-level `networks` as a list of names or a map with options
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceNetworks {
    List(Vec<String>),
    Map(BTreeMap<String, serde_yaml::Value>),
}

impl ServiceNetworks {
    pub fn names(&self) -> Vec<String> {
        match self {
            ServiceNetworks::List(names) => names.clone(),
            ServiceNetworks::Map(map) => map.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_loose_shapes() {
        let yaml = r#"
image: redis:7
command: redis-server --appendonly yes
environment:
  - FOO=bar
ports:
  - 6379
  - "127.0.0.1:6380:6379"
depends_on:
  db:
    condition: service_healthy
"#;
        let svc: Service = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(svc.image.as_deref(), Some("redis:7"));
        assert_eq!(
            svc.command.unwrap().to_args(),
            vec!["redis-server", "--appendonly", "yes"]
        );
        assert!(matches!(svc.ports[0], PortSpec::Number(6379)));
        match svc.depends_on.unwrap() {
            DependsOn::Map(m) => assert_eq!(m["db"].condition, "service_healthy"),
            DependsOn::List(_) => panic!("expected map form"),
        }
    }

    #[test]
    fn test_healthcheck_numeric_duration() {
        let yaml = "test: curl -f http://localhost\ninterval: 30\nretries: 3\n";
        let hc: Healthcheck = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(hc.interval, Some(DurationValue::Number(n)) if n == 30.0));
        assert_eq!(hc.retries, Some(3));
    }
}
