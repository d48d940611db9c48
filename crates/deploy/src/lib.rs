//! soroship-deploy - Idempotent deployment and initialization of Soroban contract sets.
//!
//! This crate deploys an ordered list of contract artifacts to a Stellar network, records
//! their addresses in a per-network state file, then calls each contract's initializer with
//! arguments resolved from the deploying identity, the network's token and other artifacts'
//! addresses. Re-running is safe: recorded artifacts are skipped and "already initialized"
//! rejections count as success.

mod artifact;
pub use artifact::{
    ArtifactSpec, DEFAULT_BENIGN_REJECTIONS, DEFAULT_ENTRYPOINT, InitParam, MANIFEST_FILENAME,
    Manifest, ParamSource,
};

pub mod client;
pub use client::{ExecutionClient, IdentityProvider, InvokeArg, StellarCli};

mod context;
pub use context::{
    DEFAULT_IDENTITY, DEFAULT_NETWORK, DeploymentState, DeploymentStates, PhaseContext, RunConfig,
};

mod deployer;
pub use deployer::{DeploymentPlanner, dry_run_address};

mod error;
pub use error::{DeployError, ExecError, ResolveError};

mod initializer;
pub use initializer::{ALREADY_INITIALIZED_NOTE, InitializationPlanner};

mod orchestrator;
pub use orchestrator::{Orchestrator, RunOutcome};

mod plan;
pub use plan::DeploymentPlan;

mod report;
pub use report::{Outcome, Phase, ReportEntry, RunReport, RunSummary};

pub mod state;
pub use state::{DeploymentRecord, JsonFileStore, StateLocation, StateStore};
