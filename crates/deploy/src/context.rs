//! Per-run configuration and the mutable context shared by both phases.

use std::collections::{BTreeMap, BTreeSet};

use derive_more::Deref;

use crate::{DeploymentPlan, Manifest, RunReport};

/// Default identity used to sign deployments.
pub const DEFAULT_IDENTITY: &str = "default";

/// Default network.
pub const DEFAULT_NETWORK: &str = "testnet";

/// Operator choices for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Network passed to every remote call.
    pub network: String,
    /// Identity that signs deploys and invokes, and whose address is the admin.
    pub identity: String,
    /// Redeploy artifacts that already have a record.
    pub force: bool,
    /// Report what would happen without calling the network or writing state.
    pub dry_run: bool,
    /// Token address overriding every other token source.
    pub token: Option<String>,
    /// Restrict both phases to these artifacts. Empty means all.
    pub only: BTreeSet<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            identity: DEFAULT_IDENTITY.to_string(),
            force: false,
            dry_run: false,
            token: None,
            only: BTreeSet::new(),
        }
    }
}

impl RunConfig {
    pub fn new(network: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Whether `name` takes part in this run.
    pub fn is_selected(&self, name: &str) -> bool {
        self.only.is_empty() || self.only.contains(name)
    }
}

/// Where an artifact stands within the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentState {
    NotDeployed,
    Deployed(String),
    Initialized(String),
    Failed(String),
}

impl DeploymentState {
    /// The artifact's address, if it is at least deployed.
    pub fn address(&self) -> Option<&str> {
        match self {
            DeploymentState::Deployed(address) | DeploymentState::Initialized(address) => {
                Some(address)
            }
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DeploymentState::Failed(_))
    }
}

/// State of every artifact in the plan, owned by the orchestrator for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct DeploymentStates(BTreeMap<String, DeploymentState>);

impl DeploymentStates {
    /// Initial states: `Deployed` for artifacts with a record, `NotDeployed` otherwise.
    pub fn from_records(plan: &DeploymentPlan, records: &BTreeMap<String, String>) -> Self {
        Self(
            plan.artifacts()
                .iter()
                .map(|artifact| {
                    let state = match records.get(&artifact.name) {
                        Some(address) => DeploymentState::Deployed(address.clone()),
                        None => DeploymentState::NotDeployed,
                    };
                    (artifact.name.clone(), state)
                })
                .collect(),
        )
    }

    pub fn state(&self, name: &str) -> &DeploymentState {
        self.0.get(name).unwrap_or(&DeploymentState::NotDeployed)
    }

    pub fn set(&mut self, name: &str, state: DeploymentState) {
        tracing::trace!(artifact = name, state = ?state, "State transition");
        self.0.insert(name.to_string(), state);
    }

    /// Names of the artifacts that ended the run failed.
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, state)| state.is_failed())
            .map(|(name, _)| name.as_str())
    }
}

/// Context available to both phases.
pub struct PhaseContext<'a, C, S> {
    pub client: &'a C,
    pub store: &'a S,
    pub config: &'a RunConfig,
    pub manifest: &'a Manifest,
    pub states: &'a mut DeploymentStates,
    pub report: &'a mut RunReport,
}
