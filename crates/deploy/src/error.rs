//! Error taxonomy for a deployment run.
//!
//! [`DeployError`] values are fatal: they abort the run before or between phases.
//! Per-artifact failures ([`ExecError`], [`ResolveError`]) never abort a run, they end
//! up as `failed` or `skipped` rows in the [`crate::RunReport`].

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that abort the whole run.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The state file could not be read, parsed or written.
    #[error("state store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// Two artifacts in the manifest share a name.
    #[error("duplicate artifact name `{0}`")]
    DuplicateArtifact(String),

    /// An init parameter (or a `--only` selection) names an artifact that is not in the manifest.
    #[error("`{referrer}` references unknown artifact `{reference}`")]
    UnknownArtifact { referrer: String, reference: String },

    /// The artifact reference graph contains a cycle.
    #[error("cycle detected in artifact references: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    /// The deploying identity could not be resolved or created.
    #[error("identity `{identity}` unavailable: {source}")]
    IdentityUnavailable {
        identity: String,
        #[source]
        source: ExecError,
    },

    /// Building the contract binaries failed.
    #[error("build failed: {0}")]
    Build(#[source] ExecError),
}

/// Outcome classes of a call to the remote execution client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The call reached the network and was refused.
    #[error("remote rejected: {0}")]
    RemoteRejected(String),

    /// The network could not be reached, the call timed out, or the response was unparsable.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl ExecError {
    /// Only transport failures are worth retrying from outside the run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::TransportFailure(_))
    }
}

/// Errors raised while resolving an artifact's init parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The referenced artifact has no address (never deployed and not recorded).
    #[error("unresolved dependency `{0}`: artifact is not deployed")]
    UnresolvedDependency(String),

    /// The referenced artifact failed earlier in this run.
    #[error("dependency failed: {0}")]
    DependencyFailed(String),

    /// No token address was configured and the network default could not be looked up.
    #[error("no token address for network `{network}` ({reason}); pass --token")]
    UnresolvedToken { network: String, reason: String },
}
