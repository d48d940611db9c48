//! Init phase: call each deployed artifact's initializer with resolved arguments.

use crate::{
    ArtifactSpec, DeploymentPlan, DeploymentState, ExecError, ExecutionClient, InvokeArg, Outcome,
    ParamSource, Phase, PhaseContext, ResolveError,
};

/// Note recorded when an initializer rejects because it already ran.
pub const ALREADY_INITIALIZED_NOTE: &str = "already initialized";

/// Drives the init phase in topological order of the artifact reference graph.
///
/// Nothing here aborts the run: resolution errors and rejected calls are recorded against
/// the artifact and the phase continues.
pub struct InitializationPlanner<'a> {
    plan: &'a DeploymentPlan,
    admin: &'a str,
    token: Option<Result<String, ResolveError>>,
}

impl<'a> InitializationPlanner<'a> {
    pub fn new(plan: &'a DeploymentPlan, admin: &'a str) -> Self {
        Self {
            plan,
            admin,
            token: None,
        }
    }

    pub async fn execute<C, S>(&mut self, ctx: &mut PhaseContext<'_, C, S>)
    where
        C: ExecutionClient,
    {
        let plan = self.plan;
        for artifact in plan.init_order() {
            let name = artifact.name.as_str();
            if !ctx.config.is_selected(name) {
                continue;
            }

            let address = match ctx.states.state(name) {
                DeploymentState::Deployed(address) | DeploymentState::Initialized(address) => {
                    address.clone()
                }
                DeploymentState::Failed(_) => {
                    ctx.report
                        .record(name, Phase::Init, Outcome::Skipped, "deploy failed".to_string());
                    continue;
                }
                DeploymentState::NotDeployed => {
                    ctx.report
                        .record(name, Phase::Init, Outcome::Skipped, "not deployed".to_string());
                    continue;
                }
            };

            if !artifact.initialize {
                ctx.report
                    .record(name, Phase::Init, Outcome::Skipped, "no initializer".to_string());
                continue;
            }

            let args = match self.resolve_args(artifact, ctx).await {
                Ok(args) => args,
                Err(e @ ResolveError::DependencyFailed(_)) => {
                    ctx.report
                        .record(name, Phase::Init, Outcome::Skipped, e.to_string());
                    continue;
                }
                Err(e) => {
                    ctx.states.set(name, DeploymentState::Failed(e.to_string()));
                    ctx.report
                        .record(name, Phase::Init, Outcome::Failed, e.to_string());
                    continue;
                }
            };

            if ctx.config.dry_run {
                ctx.report.record(
                    name,
                    Phase::Init,
                    Outcome::Ok,
                    format!("dry run: would call {}", render_call(&artifact.entrypoint, &args)),
                );
                continue;
            }

            tracing::info!(
                artifact = name,
                address = %address,
                entrypoint = %artifact.entrypoint,
                "Initializing artifact..."
            );

            let result = ctx
                .client
                .invoke(
                    &address,
                    &ctx.config.identity,
                    &ctx.config.network,
                    &artifact.entrypoint,
                    &args,
                )
                .await;

            match result {
                Ok(()) => {
                    ctx.states.set(name, DeploymentState::Initialized(address));
                    ctx.report.record(name, Phase::Init, Outcome::Ok, None);
                }
                Err(ExecError::RemoteRejected(message))
                    if ctx.manifest.is_benign_rejection(&message) =>
                {
                    tracing::debug!(artifact = name, message = %message, "Initializer already ran");
                    ctx.states.set(name, DeploymentState::Initialized(address));
                    ctx.report.record(
                        name,
                        Phase::Init,
                        Outcome::Ok,
                        ALREADY_INITIALIZED_NOTE.to_string(),
                    );
                }
                Err(e) => {
                    ctx.states.set(name, DeploymentState::Failed(e.to_string()));
                    ctx.report
                        .record(name, Phase::Init, Outcome::Failed, e.to_string());
                }
            }
        }
    }

    /// Resolve every init parameter of `artifact`, in declaration order.
    async fn resolve_args<C, S>(
        &mut self,
        artifact: &ArtifactSpec,
        ctx: &PhaseContext<'_, C, S>,
    ) -> Result<Vec<InvokeArg>, ResolveError>
    where
        C: ExecutionClient,
    {
        let mut args = Vec::with_capacity(artifact.init.len());
        for param in &artifact.init {
            let value = match &param.source {
                ParamSource::Literal(value) => value.clone(),
                ParamSource::Admin => self.admin.to_string(),
                ParamSource::AdminList => format!("[\"{}\"]", self.admin),
                ParamSource::Token => self.token(ctx).await?,
                ParamSource::Artifact(reference) => match ctx.states.state(reference) {
                    DeploymentState::Deployed(address) | DeploymentState::Initialized(address) => {
                        address.clone()
                    }
                    DeploymentState::Failed(_) => {
                        return Err(ResolveError::DependencyFailed(reference.clone()));
                    }
                    DeploymentState::NotDeployed => {
                        return Err(ResolveError::UnresolvedDependency(reference.clone()));
                    }
                },
            };
            args.push(InvokeArg::new(&param.arg, value));
        }
        Ok(args)
    }

    /// The token address for this run, looked up at most once.
    async fn token<C, S>(&mut self, ctx: &PhaseContext<'_, C, S>) -> Result<String, ResolveError>
    where
        C: ExecutionClient,
    {
        if let Some(resolved) = &self.token {
            return resolved.clone();
        }

        let network = &ctx.config.network;
        let configured = ctx
            .config
            .token
            .clone()
            .or_else(|| ctx.manifest.token_for(network));

        let resolved = match configured {
            Some(token) => Ok(token),
            None => ctx
                .client
                .native_token(network)
                .await
                .map_err(|e| ResolveError::UnresolvedToken {
                    network: network.clone(),
                    reason: e.to_string(),
                }),
        };

        if let Ok(token) = &resolved {
            tracing::info!(network = %network, token = %token, "Token address resolved");
        }
        self.token = Some(resolved.clone());
        resolved
    }
}

fn render_call(entrypoint: &str, args: &[InvokeArg]) -> String {
    std::iter::once(entrypoint.to_string())
        .chain(args.iter().map(InvokeArg::to_string))
        .collect::<Vec<_>>()
        .join(" ")
}
