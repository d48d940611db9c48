//! Pipeline driver: deploy phase, then init phase, then the report.

use crate::{
    DeployError, DeploymentPlan, DeploymentPlanner, DeploymentStates, ExecutionClient,
    IdentityProvider, InitializationPlanner, Manifest, PhaseContext, RunConfig, RunReport,
    StateStore,
};

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub states: DeploymentStates,
}

impl RunOutcome {
    /// A run succeeds when no artifact ended `Failed`; skips do not count against it.
    pub fn is_success(&self) -> bool {
        self.states.failed().next().is_none()
    }
}

/// Runs the whole pipeline for one network.
///
/// Assumes it is the only writer of the network's state for the duration of the run.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    manifest: Manifest,
    plan: DeploymentPlan,
    config: RunConfig,
}

impl Orchestrator {
    /// Validate the manifest and the selection. Fails before any network call.
    pub fn new(manifest: Manifest, config: RunConfig) -> Result<Self, DeployError> {
        let plan = DeploymentPlan::new(manifest.artifacts.clone())?;
        plan.validate_selection(&config.only)?;
        Ok(Self {
            manifest,
            plan,
            config,
        })
    }

    pub async fn run<C, I, S>(
        &self,
        client: &C,
        identities: &I,
        store: &S,
    ) -> Result<RunOutcome, DeployError>
    where
        C: ExecutionClient,
        I: IdentityProvider,
        S: StateStore,
    {
        let config = &self.config;

        tracing::info!(
            network = %config.network,
            identity = %config.identity,
            force = config.force,
            dry_run = config.dry_run,
            artifacts = self.plan.artifacts().len(),
            "Starting deployment run..."
        );

        let records = store.load_all(&config.network)?;
        let mut states = DeploymentStates::from_records(&self.plan, &records);

        let admin = identities
            .resolve_address(&config.identity, &config.network)
            .await
            .map_err(|source| DeployError::IdentityUnavailable {
                identity: config.identity.clone(),
                source,
            })?;
        tracing::info!(identity = %config.identity, address = %admin, "Identity resolved");

        if !config.dry_run {
            store.set_deployer(&config.network, &admin)?;
        }

        let mut report = RunReport::new();
        let mut ctx = PhaseContext {
            client,
            store,
            config,
            manifest: &self.manifest,
            states: &mut states,
            report: &mut report,
        };

        tracing::info!("Deploy phase...");
        DeploymentPlanner::new(&self.plan).execute(&mut ctx).await?;

        tracing::info!("Init phase...");
        InitializationPlanner::new(&self.plan, &admin)
            .execute(&mut ctx)
            .await;

        let outcome = RunOutcome { report, states };
        tracing::info!(
            summary = %outcome.report.summary(),
            success = outcome.is_success(),
            "Run complete"
        );

        Ok(outcome)
    }
}
