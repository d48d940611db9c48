//! Deploy phase: upload every selected artifact that has no record yet.

use crate::{
    DeployError, DeploymentPlan, DeploymentRecord, DeploymentState, ExecutionClient, Outcome,
    Phase, PhaseContext, StateStore,
};

/// Address recorded for an artifact "deployed" during a dry run.
pub fn dry_run_address(name: &str) -> String {
    format!("dry-run:{name}")
}

/// Drives the deploy phase over the plan's artifacts in configured order.
///
/// A failed deploy marks that artifact `Failed` and moves on to the next one. Only an
/// unavailable state store aborts the phase.
pub struct DeploymentPlanner<'a> {
    plan: &'a DeploymentPlan,
}

impl<'a> DeploymentPlanner<'a> {
    pub fn new(plan: &'a DeploymentPlan) -> Self {
        Self { plan }
    }

    pub async fn execute<C, S>(&self, ctx: &mut PhaseContext<'_, C, S>) -> Result<(), DeployError>
    where
        C: ExecutionClient,
        S: StateStore,
    {
        let network = ctx.config.network.as_str();

        for artifact in self.plan.artifacts() {
            let name = artifact.name.as_str();
            if !ctx.config.is_selected(name) {
                continue;
            }

            let existing = ctx.store.get(network, name)?;

            if let Some(record) = existing.as_ref().filter(|_| !ctx.config.force) {
                let mut note = format!("already deployed at {}", record.address);

                let current_hash = artifact.wasm_hash();
                if record.wasm_hash.is_some()
                    && current_hash.is_some()
                    && record.wasm_hash != current_hash
                {
                    tracing::warn!(
                        artifact = name,
                        address = %record.address,
                        "Wasm changed since the recorded deployment; pass --force to redeploy"
                    );
                    note.push_str("; wasm changed since deploy");
                }

                ctx.states
                    .set(name, DeploymentState::Deployed(record.address.clone()));
                ctx.report.record(name, Phase::Deploy, Outcome::Skipped, note);
                continue;
            }

            if ctx.config.dry_run {
                let verb = if existing.is_some() { "redeploy" } else { "deploy" };
                ctx.states
                    .set(name, DeploymentState::Deployed(dry_run_address(name)));
                ctx.report.record(
                    name,
                    Phase::Deploy,
                    Outcome::Ok,
                    format!("dry run: would {verb} {}", artifact.wasm.display()),
                );
                continue;
            }

            tracing::info!(
                artifact = name,
                wasm = %artifact.wasm.display(),
                network,
                "Deploying artifact..."
            );

            match ctx
                .client
                .deploy(&artifact.wasm, &ctx.config.identity, network)
                .await
            {
                Ok(address) => {
                    let record = DeploymentRecord::new(network, name, address.clone())
                        .with_wasm_hash(artifact.wasm_hash());
                    ctx.store.put(&record)?;

                    ctx.states.set(name, DeploymentState::Deployed(address.clone()));
                    ctx.report.record(name, Phase::Deploy, Outcome::Ok, address);
                }
                Err(e) => {
                    ctx.states.set(name, DeploymentState::Failed(e.to_string()));
                    ctx.report
                        .record(name, Phase::Deploy, Outcome::Failed, e.to_string());
                }
            }
        }

        Ok(())
    }
}
