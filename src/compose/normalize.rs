//! Compose normalization
//!
//! Folds the loose raw shapes from `spec` into one canonical form: ports
//! become `PortMapping`, volumes become `VolumeMount`, environment and
//! labels become maps, healthcheck test commands become exec arrays and
//! numeric durations gain their seconds suffix.

use std::collections::BTreeMap;

use serde::Serialize;

use super::graph;
use super::spec::{
    ComposeFile, DependsOn, DurationValue, HealthTest, Healthcheck, ListOrMap, PortSpec, Service,
    VolumeSpec,
};
use super::ComposeError;

/// Canonical port mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<u16>,
    pub target: u16,
    pub protocol: String,
}

/// Canonical volume mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeMount {
    pub kind: MountKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub target: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MountKind {
    Bind,
    Volume,
    Tmpfs,
}

/// Healthcheck with the test coerced to exec-array form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedHealthcheck {
    pub test: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

/// A fully normalized service
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeMount>,
    /// dependency name -> condition
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub depends_on: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<NormalizedHealthcheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

/// A normalized compose document plus its resolved start order
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedCompose {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub services: BTreeMap<String, NormalizedService>,
    pub deploy_order: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

/// Normalize a parsed compose file and resolve its deploy order
pub fn normalize_file(
    file: ComposeFile,
    vars: &BTreeMap<String, String>,
) -> Result<NormalizedCompose, ComposeError> {
    let mut services = BTreeMap::new();
    for (name, service) in file.services {
        if !valid_service_name(&name) {
            return Err(ComposeError::InvalidServiceName(name));
        }
        let normalized = normalize_service(&name, service, vars)?;
        services.insert(name, normalized);
    }

    // every dependency must reference a defined service
    for (name, service) in &services {
        for dep in service.depends_on.keys() {
            if !services.contains_key(dep) {
                return Err(ComposeError::UnknownDependency {
                    service: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let deploy_order = graph::deploy_order(&services)?;

    Ok(NormalizedCompose {
        name: file.name,
        services,
        deploy_order,
        networks: file.networks.keys().cloned().collect(),
        volumes: file.volumes.keys().cloned().collect(),
    })
}

fn valid_service_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn normalize_service(
    name: &str,
    service: Service,
    vars: &BTreeMap<String, String>,
) -> Result<NormalizedService, ComposeError> {
    let ports = service
        .ports
        .iter()
        .map(normalize_port)
        .collect::<Result<Vec<_>, _>>()?;

    let volumes = service
        .volumes
        .iter()
        .map(normalize_volume)
        .collect::<Result<Vec<_>, _>>()?;

    let healthcheck = match service.healthcheck {
        Some(hc) => Some(normalize_healthcheck(name, hc)?),
        None => None,
    };

    Ok(NormalizedService {
        image: service.image,
        container_name: service.container_name,
        command: service.command.map(|c| c.to_args()),
        entrypoint: service.entrypoint.map(|c| c.to_args()),
        environment: service
            .environment
            .map(|e| normalize_list_or_map(e, vars))
            .unwrap_or_default(),
        labels: service
            .labels
            .map(|l| normalize_list_or_map(l, vars))
            .unwrap_or_default(),
        ports,
        volumes,
        depends_on: normalize_depends_on(service.depends_on),
        healthcheck,
        restart: service.restart,
        networks: service.networks.map(|n| n.names()).unwrap_or_default(),
    })
}

/// Fold the list form into the map form
///
/// A list entry without `=` is a pass-through: its value is taken from
/// `vars` when present and the entry is dropped otherwise. Map entries with
/// a null value behave the same way.
fn normalize_list_or_map(
    input: ListOrMap,
    vars: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match input {
        ListOrMap::List(entries) => {
            for entry in entries {
                match entry.split_once('=') {
                    Some((key, value)) => {
                        out.insert(key.to_string(), value.to_string());
                    }
                    None => {
                        if let Some(value) = vars.get(entry.as_str()) {
                            out.insert(entry, value.clone());
                        }
                    }
                }
            }
        }
        ListOrMap::Map(entries) => {
            for (key, value) in entries {
                match value {
                    Some(value) => {
                        out.insert(key, yaml_scalar_to_string(&value));
                    }
                    None => {
                        if let Some(value) = vars.get(key.as_str()) {
                            out.insert(key, value.clone());
                        }
                    }
                }
            }
        }
    }
    out
}

/// Render a YAML scalar the way compose would pass it to the engine
fn yaml_scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn normalize_depends_on(depends_on: Option<DependsOn>) -> BTreeMap<String, String> {
    match depends_on {
        None => BTreeMap::new(),
        Some(DependsOn::List(names)) => names
            .into_iter()
            .map(|n| (n, "service_started".to_string()))
            .collect(),
        Some(DependsOn::Map(map)) => map
            .into_iter()
            .map(|(name, detail)| (name, detail.condition))
            .collect(),
    }
}

/// Normalize one port entry to `PortMapping`
pub fn normalize_port(spec: &PortSpec) -> Result<PortMapping, ComposeError> {
    match spec {
        PortSpec::Number(target) => Ok(PortMapping {
            host_ip: None,
            published: None,
            target: *target,
            protocol: "tcp".to_string(),
        }),
        PortSpec::Long(long) => {
            let published = match &long.published {
                Some(p) => Some(
                    p.as_u16()
                        .ok_or_else(|| ComposeError::InvalidPort(format!("{:?}", p)))?,
                ),
                None => None,
            };
            Ok(PortMapping {
                host_ip: long.host_ip.clone(),
                published,
                target: long.target,
                protocol: long.protocol.clone().unwrap_or_else(|| "tcp".to_string()),
            })
        }
        PortSpec::String(s) => parse_short_port(s),
    }
}

/// Parse short port syntax: `80`, `8080:80`, `127.0.0.1:8080:80`, `/udp` suffix
fn parse_short_port(spec: &str) -> Result<PortMapping, ComposeError> {
    let invalid = || ComposeError::InvalidPort(spec.to_string());

    let (address, protocol) = match spec.split_once('/') {
        Some((addr, proto)) => {
            if !matches!(proto, "tcp" | "udp" | "sctp") {
                return Err(invalid());
            }
            (addr, proto.to_string())
        }
        None => (spec, "tcp".to_string()),
    };

    let parts: Vec<&str> = address.split(':').collect();
    let parse_port = |s: &str| s.trim().parse::<u16>().map_err(|_| invalid());

    match parts.as_slice() {
        [target] => Ok(PortMapping {
            host_ip: None,
            published: None,
            target: parse_port(target)?,
            protocol,
        }),
        [published, target] => Ok(PortMapping {
            host_ip: None,
            published: Some(parse_port(published)?),
            target: parse_port(target)?,
            protocol,
        }),
        [host_ip, published, target] => Ok(PortMapping {
            host_ip: Some(host_ip.to_string()),
            published: Some(parse_port(published)?),
            target: parse_port(target)?,
            protocol,
        }),
        _ => Err(invalid()),
    }
}

/// Normalize one volume entry to `VolumeMount`
pub fn normalize_volume(spec: &VolumeSpec) -> Result<VolumeMount, ComposeError> {
    match spec {
        VolumeSpec::Long(long) => {
            let kind = match long.kind.as_deref() {
                None => infer_mount_kind(long.source.as_deref()),
                Some("bind") => MountKind::Bind,
                Some("volume") => MountKind::Volume,
                Some("tmpfs") => MountKind::Tmpfs,
                Some(_) => return Err(ComposeError::InvalidVolume(long.target.clone())),
            };
            Ok(VolumeMount {
                kind,
                source: long.source.clone(),
                target: long.target.clone(),
                read_only: long.read_only,
            })
        }
        VolumeSpec::String(s) => parse_short_volume(s),
    }
}

/// Parse short volume syntax: `/dst`, `src:/dst`, `src:/dst:ro`
fn parse_short_volume(spec: &str) -> Result<VolumeMount, ComposeError> {
    let invalid = || ComposeError::InvalidVolume(spec.to_string());

    let parts: Vec<&str> = spec.split(':').collect();
    let (source, target, options) = match parts.as_slice() {
        [target] => (None, *target, None),
        [source, target] => (Some(*source), *target, None),
        [source, target, options] => (Some(*source), *target, Some(*options)),
        _ => return Err(invalid()),
    };

    if target.is_empty() || !target.starts_with('/') {
        return Err(invalid());
    }

    let read_only = match options {
        Some(opts) => opts.split(',').any(|o| o == "ro"),
        None => false,
    };

    Ok(VolumeMount {
        kind: infer_mount_kind(source),
        source: source.map(str::to_string),
        target: target.to_string(),
        read_only,
    })
}

/// Paths bind-mount, bare names reference a named volume
fn infer_mount_kind(source: Option<&str>) -> MountKind {
    match source {
        Some(s) if s.starts_with('/') || s.starts_with('.') || s.starts_with('~') => {
            MountKind::Bind
        }
        _ => MountKind::Volume,
    }
}

/// Normalize a healthcheck block
pub fn normalize_healthcheck(
    service: &str,
    hc: Healthcheck,
) -> Result<NormalizedHealthcheck, ComposeError> {
    let test = if hc.disable {
        vec!["NONE".to_string()]
    } else {
        match hc.test {
            // a string test runs through the shell
            Some(HealthTest::Command(cmd)) => vec!["CMD-SHELL".to_string(), cmd],
            Some(HealthTest::Argv(argv)) => {
                if argv.is_empty() {
                    return Err(ComposeError::InvalidHealthcheck {
                        service: service.to_string(),
                        reason: "empty test array".to_string(),
                    });
                }
                match argv[0].as_str() {
                    "CMD" | "CMD-SHELL" | "NONE" => argv,
                    // plain argv form, runs without a shell
                    _ => {
                        let mut with_prefix = vec!["CMD".to_string()];
                        with_prefix.extend(argv);
                        with_prefix
                    }
                }
            }
            None => {
                return Err(ComposeError::InvalidHealthcheck {
                    service: service.to_string(),
                    reason: "missing test".to_string(),
                })
            }
        }
    };

    Ok(NormalizedHealthcheck {
        test,
        interval: hc.interval.map(normalize_duration).transpose()?,
        timeout: hc.timeout.map(normalize_duration).transpose()?,
        start_period: hc.start_period.map(normalize_duration).transpose()?,
        retries: hc.retries,
    })
}

/// Coerce a duration to string form, bare numbers gain a seconds suffix
fn normalize_duration(value: DurationValue) -> Result<String, ComposeError> {
    match value {
        DurationValue::Number(n) => {
            if n < 0.0 || !n.is_finite() {
                return Err(ComposeError::InvalidDuration(n.to_string()));
            }
            if n.fract() == 0.0 {
                Ok(format!("{}s", n as u64))
            } else {
                Ok(format!("{}s", n))
            }
        }
        DurationValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(ComposeError::InvalidDuration(s));
            }
            // bare numeric strings are treated like numbers
            if trimmed.chars().all(|c| c.is_ascii_digit()) {
                return Ok(format!("{}s", trimmed));
            }
            if !valid_duration(trimmed) {
                return Err(ComposeError::InvalidDuration(s));
            }
            Ok(trimmed.to_string())
        }
    }
}

/// Accepts sequences of `<number><unit>` with units us, ms, s, m, h
fn valid_duration(s: &str) -> bool {
    let mut rest = s;
    let mut matched = false;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        let unit_len = if rest.starts_with("us") || rest.starts_with("ms") {
            2
        } else if rest.starts_with('s') || rest.starts_with('m') || rest.starts_with('h') {
            1
        } else {
            return false;
        };
        rest = &rest[unit_len..];
        matched = true;
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose;

    fn no_vars() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_short_port_forms() {
        let p = parse_short_port("8080:80").unwrap();
        assert_eq!(p.published, Some(8080));
        assert_eq!(p.target, 80);
        assert_eq!(p.protocol, "tcp");

        let p = parse_short_port("127.0.0.1:5433:5432/udp").unwrap();
        assert_eq!(p.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(p.protocol, "udp");

        let p = parse_short_port("9000").unwrap();
        assert_eq!(p.published, None);
        assert_eq!(p.target, 9000);
    }

    #[test]
    fn test_invalid_ports() {
        assert!(parse_short_port("abc").is_err());
        assert!(parse_short_port("80/quic").is_err());
        assert!(parse_short_port("1:2:3:4").is_err());
        assert!(parse_short_port("99999").is_err());
    }

    #[test]
    fn test_short_volume_forms() {
        let v = parse_short_volume("./src:/app:ro").unwrap();
        assert_eq!(v.kind, MountKind::Bind);
        assert_eq!(v.source.as_deref(), Some("./src"));
        assert!(v.read_only);

        let v = parse_short_volume("data:/var/lib/postgresql/data").unwrap();
        assert_eq!(v.kind, MountKind::Volume);
        assert!(!v.read_only);

        let v = parse_short_volume("/cache").unwrap();
        assert_eq!(v.source, None);
        assert_eq!(v.target, "/cache");
    }

    #[test]
    fn test_volume_requires_absolute_target() {
        assert!(parse_short_volume("data:relative").is_err());
        assert!(parse_short_volume("").is_err());
    }

    #[test]
    fn test_healthcheck_string_becomes_cmd_shell() {
        let hc = Healthcheck {
            test: Some(HealthTest::Command("curl -f http://localhost".into())),
            interval: Some(DurationValue::Number(30.0)),
            timeout: Some(DurationValue::String("5s".into())),
            start_period: None,
            retries: Some(3),
            disable: false,
        };
        let n = normalize_healthcheck("web", hc).unwrap();
        assert_eq!(n.test[0], "CMD-SHELL");
        assert_eq!(n.interval.as_deref(), Some("30s"));
        assert_eq!(n.timeout.as_deref(), Some("5s"));
    }

    #[test]
    fn test_healthcheck_argv_gets_cmd_prefix() {
        let hc = Healthcheck {
            test: Some(HealthTest::Argv(vec!["curl".into(), "-f".into()])),
            ..Default::default()
        };
        let n = normalize_healthcheck("web", hc).unwrap();
        assert_eq!(n.test, vec!["CMD", "curl", "-f"]);
    }

    #[test]
    fn test_healthcheck_disable_wins() {
        let hc = Healthcheck {
            test: Some(HealthTest::Command("true".into())),
            disable: true,
            ..Default::default()
        };
        let n = normalize_healthcheck("web", hc).unwrap();
        assert_eq!(n.test, vec!["NONE"]);
    }

    #[test]
    fn test_duration_validation() {
        assert_eq!(
            normalize_duration(DurationValue::String("1m30s".into())).unwrap(),
            "1m30s"
        );
        assert_eq!(
            normalize_duration(DurationValue::String("90".into())).unwrap(),
            "90s"
        );
        assert!(normalize_duration(DurationValue::String("fast".into())).is_err());
        assert!(normalize_duration(DurationValue::Number(-1.0)).is_err());
    }

    #[test]
    fn test_environment_list_and_passthrough() {
        let vars: BTreeMap<String, String> =
            [("HOME_DIR".to_string(), "/home/app".to_string())].into();
        let env = normalize_list_or_map(
            ListOrMap::List(vec![
                "A=1".to_string(),
                "HOME_DIR".to_string(),
                "MISSING".to_string(),
            ]),
            &vars,
        );
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert_eq!(env.get("HOME_DIR").map(String::as_str), Some("/home/app"));
        assert!(!env.contains_key("MISSING"));
    }

    #[test]
    fn test_environment_map_scalars() {
        let yaml = "DEBUG: true\nWORKERS: 4\nNAME: app\nOPTIONAL:\n";
        let parsed: ListOrMap = serde_yaml::from_str(yaml).unwrap();
        let env = normalize_list_or_map(parsed, &no_vars());
        assert_eq!(env.get("DEBUG").map(String::as_str), Some("true"));
        assert_eq!(env.get("WORKERS").map(String::as_str), Some("4"));
        assert_eq!(env.get("NAME").map(String::as_str), Some("app"));
        assert!(!env.contains_key("OPTIONAL"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let text = "services:\n  web:\n    image: nginx\n    depends_on:\n      - ghost\n";
        let err = compose::load(text, &no_vars()).unwrap_err();
        match err {
            ComposeError::UnknownDependency {
                service,
                dependency,
            } => {
                assert_eq!(service, "web");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_service_name_rejected() {
        let text = "services:\n  \"bad name\":\n    image: nginx\n";
        let err = compose::load(text, &no_vars()).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidServiceName(_)));
    }

    #[test]
    fn test_normalization_is_idempotent_on_ports() {
        // normalizing an already-long port spec changes nothing
        let spec = PortSpec::Long(super::super::spec::PortLong {
            target: 80,
            published: Some(super::super::spec::NumberOrString::Number(8080)),
            protocol: Some("tcp".to_string()),
            host_ip: None,
        });
        let once = normalize_port(&spec).unwrap();
        assert_eq!(once.target, 80);
        assert_eq!(once.published, Some(8080));
    }
}
