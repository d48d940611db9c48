//! Validated deployment plan: deploy order and init order of the manifest's artifacts.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{ArtifactSpec, DeployError};

/// A manifest checked for duplicate names, dangling references and cycles.
///
/// Deploy order is the configured order. Init order is a topological sort of the
/// artifact reference graph that keeps configured order among independent artifacts.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    artifacts: Vec<ArtifactSpec>,
    init_order: Vec<usize>,
}

impl DeploymentPlan {
    pub fn new(artifacts: Vec<ArtifactSpec>) -> Result<Self, DeployError> {
        let mut index = HashMap::with_capacity(artifacts.len());
        for (i, artifact) in artifacts.iter().enumerate() {
            if index.insert(artifact.name.as_str(), i).is_some() {
                return Err(DeployError::DuplicateArtifact(artifact.name.clone()));
            }
        }

        // deps[i] = indices artifact i references
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let mut edges = Vec::new();
            for reference in artifact.dependencies() {
                let target =
                    *index
                        .get(reference)
                        .ok_or_else(|| DeployError::UnknownArtifact {
                            referrer: artifact.name.clone(),
                            reference: reference.to_string(),
                        })?;
                if !edges.contains(&target) {
                    edges.push(target);
                }
            }
            deps.push(edges);
        }

        let init_order = topological_order(&deps).ok_or_else(|| {
            DeployError::CycleDetected(
                find_cycle(&deps)
                    .into_iter()
                    .map(|i| artifacts[i].name.clone())
                    .collect(),
            )
        })?;

        Ok(Self {
            artifacts,
            init_order,
        })
    }

    /// Artifacts in deploy order.
    pub fn artifacts(&self) -> &[ArtifactSpec] {
        &self.artifacts
    }

    /// Artifacts in init order: every artifact comes after the ones it references.
    pub fn init_order(&self) -> impl Iterator<Item = &ArtifactSpec> {
        self.init_order.iter().map(|&i| &self.artifacts[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.iter().any(|a| a.name == name)
    }

    /// Check that every selected name exists in the plan.
    pub fn validate_selection(&self, selection: &BTreeSet<String>) -> Result<(), DeployError> {
        match selection.iter().find(|name| !self.contains(name)) {
            Some(unknown) => Err(DeployError::UnknownArtifact {
                referrer: "--only".to_string(),
                reference: unknown.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Kahn's algorithm, always picking the lowest ready index. Returns `None` on a cycle.
fn topological_order(deps: &[Vec<usize>]) -> Option<Vec<usize>> {
    let n = deps.len();
    let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents = vec![Vec::new(); n];
    for (i, edges) in deps.iter().enumerate() {
        for &d in edges {
            dependents[d].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    (order.len() == n).then_some(order)
}

/// Depth-first search for one cycle, returned as a closed path (first == last).
fn find_cycle(deps: &[Vec<usize>]) -> Vec<usize> {
    fn visit(
        node: usize,
        deps: &[Vec<usize>],
        done: &mut HashSet<usize>,
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        if let Some(pos) = stack.iter().position(|&n| n == node) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        if done.contains(&node) {
            return None;
        }
        stack.push(node);
        for &next in &deps[node] {
            if let Some(cycle) = visit(next, deps, done, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        done.insert(node);
        None
    }

    let mut done = HashSet::new();
    (0..deps.len())
        .find_map(|start| visit(start, deps, &mut done, &mut Vec::new()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InitParam, Manifest};

    fn artifact(name: &str, refs: &[&str]) -> ArtifactSpec {
        refs.iter().fold(
            ArtifactSpec::new(name, format!("{name}.wasm")).with_param(InitParam::admin("admin")),
            |spec, r| spec.with_param(InitParam::artifact(*r, *r)),
        )
    }

    fn init_names(plan: &DeploymentPlan) -> Vec<&str> {
        plan.init_order().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn test_init_order_respects_references() {
        // c is configured first but depends on b, which depends on a.
        let plan = DeploymentPlan::new(vec![
            artifact("c", &["b"]),
            artifact("b", &["a"]),
            artifact("a", &[]),
            artifact("d", &[]),
        ])
        .expect("plan should be valid");

        let deploy: Vec<_> = plan.artifacts().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(deploy, vec!["c", "b", "a", "d"]);
        assert_eq!(init_names(&plan), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_init_order_is_stable_without_references() {
        let plan = DeploymentPlan::new(vec![
            artifact("x", &[]),
            artifact("y", &[]),
            artifact("z", &[]),
        ])
        .expect("plan should be valid");

        assert_eq!(init_names(&plan), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_default_manifest_plan() {
        let plan =
            DeploymentPlan::new(Manifest::default().artifacts).expect("plan should be valid");
        let order = init_names(&plan);
        let token = order.iter().position(|n| *n == "governance-token");
        let dao = order.iter().position(|n| *n == "governance-dao");
        assert!(token < dao);
    }

    #[test]
    fn test_duplicate_artifact() {
        let err = DeploymentPlan::new(vec![artifact("a", &[]), artifact("a", &[])]).unwrap_err();
        assert!(matches!(err, DeployError::DuplicateArtifact(name) if name == "a"));
    }

    #[test]
    fn test_unknown_reference() {
        let err = DeploymentPlan::new(vec![artifact("a", &["ghost"])]).unwrap_err();
        assert!(matches!(
            err,
            DeployError::UnknownArtifact { referrer, reference } if referrer == "a" && reference == "ghost"
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let err = DeploymentPlan::new(vec![
            artifact("a", &["c"]),
            artifact("b", &["a"]),
            artifact("c", &["b"]),
            artifact("d", &[]),
        ])
        .unwrap_err();

        let DeployError::CycleDetected(path) = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 4);
        assert!(!path.contains(&"d".to_string()));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let err = DeploymentPlan::new(vec![artifact("a", &["a"])]).unwrap_err();
        assert!(matches!(err, DeployError::CycleDetected(path) if path == vec!["a", "a"]));
    }

    #[test]
    fn test_validate_selection() {
        let plan = DeploymentPlan::new(vec![artifact("a", &[])]).expect("plan should be valid");

        assert!(plan.validate_selection(&BTreeSet::new()).is_ok());
        assert!(plan.validate_selection(&["a".to_string()].into()).is_ok());
        assert!(matches!(
            plan.validate_selection(&["b".to_string()].into()),
            Err(DeployError::UnknownArtifact { reference, .. }) if reference == "b"
        ));
    }
}
