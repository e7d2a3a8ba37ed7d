//! Service dependency resolution
//!
//! Depth-first topological sort over `depends_on` with cycle detection.
//! The order is deterministic: siblings resolve lexicographically.

use std::collections::BTreeMap;

use super::normalize::NormalizedService;
use super::ComposeError;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Resolve service start order, dependencies before dependents
pub fn deploy_order(
    services: &BTreeMap<String, NormalizedService>,
) -> Result<Vec<String>, ComposeError> {
    let mut marks: BTreeMap<&str, Mark> = services
        .keys()
        .map(|name| (name.as_str(), Mark::Unvisited))
        .collect();
    let mut order = Vec::with_capacity(services.len());
    let mut stack = Vec::new();

    for name in services.keys() {
        visit(name, services, &mut marks, &mut stack, &mut order)?;
    }

    Ok(order)
}

fn visit(
    name: &str,
    services: &BTreeMap<String, NormalizedService>,
    marks: &mut BTreeMap<&str, Mark>,
    stack: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<(), ComposeError> {
    match marks.get(name).copied() {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            // close the cycle path for the error message
            let mut cycle: Vec<String> = stack
                .iter()
                .skip_while(|n| n.as_str() != name)
                .cloned()
                .collect();
            cycle.push(name.to_string());
            return Err(ComposeError::DependencyCycle(cycle));
        }
        // unknown names are caught during normalization
        None => return Ok(()),
        Some(Mark::Unvisited) => {}
    }

    if let Some(mark) = marks.get_mut(name) {
        *mark = Mark::InProgress;
    }
    stack.push(name.to_string());

    if let Some(service) = services.get(name) {
        // BTreeMap keys iterate sorted, which keeps the order stable
        for dep in service.depends_on.keys() {
            visit(dep, services, marks, stack, order)?;
        }
    }

    stack.pop();
    if let Some(mark) = marks.get_mut(name) {
        *mark = Mark::Done;
    }
    order.push(name.to_string());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(deps: &[&str]) -> NormalizedService {
        NormalizedService {
            depends_on: deps
                .iter()
                .map(|d| (d.to_string(), "service_started".to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn services(entries: &[(&str, &[&str])]) -> BTreeMap<String, NormalizedService> {
        entries
            .iter()
            .map(|(name, deps)| (name.to_string(), service(deps)))
            .collect()
    }

    #[test]
    fn test_linear_chain() {
        let svcs = services(&[("web", &["api"]), ("api", &["db"]), ("db", &[])]);
        assert_eq!(deploy_order(&svcs).unwrap(), vec!["db", "api", "web"]);
    }

    #[test]
    fn test_independent_services_sorted() {
        let svcs = services(&[("c", &[]), ("a", &[]), ("b", &[])]);
        assert_eq!(deploy_order(&svcs).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond() {
        let svcs = services(&[
            ("app", &["cache", "db"]),
            ("cache", &["base"]),
            ("db", &["base"]),
            ("base", &[]),
        ]);
        let order = deploy_order(&svcs).unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("base") < pos("cache"));
        assert!(pos("base") < pos("db"));
        assert!(pos("cache") < pos("app"));
        assert!(pos("db") < pos("app"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let svcs = services(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        match deploy_order(&svcs).unwrap_err() {
            ComposeError::DependencyCycle(path) => {
                assert_eq!(path.first(), path.last());
                assert!(path.len() >= 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let svcs = services(&[("a", &["a"])]);
        assert!(matches!(
            deploy_order(&svcs).unwrap_err(),
            ComposeError::DependencyCycle(_)
        ));
    }

    #[test]
    fn test_every_service_appears_once() {
        let svcs = services(&[("web", &["db"]), ("worker", &["db"]), ("db", &[])]);
        let order = deploy_order(&svcs).unwrap();
        assert_eq!(order.len(), 3);
        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
    }
}
