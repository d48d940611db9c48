//! Seams to the remote network: deploying and invoking contracts, and resolving identities.

mod cmd;
mod stellar;

use std::{future::Future, path::Path};

pub use cmd::StellarCmdBuilder;
pub use stellar::{DEFAULT_CALL_TIMEOUT, DEFAULT_STELLAR_BIN, StellarCli};

use crate::ExecError;

/// A named argument for a contract call, rendered as `--<name> <value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeArg {
    pub name: String,
    pub value: String,
}

impl InvokeArg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for InvokeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--{} {}", self.name, self.value)
    }
}

/// Deploys and invokes contracts on a network.
///
/// Implementations own their timeout policy: a call must return
/// [`ExecError::TransportFailure`] rather than hang.
pub trait ExecutionClient: Send + Sync {
    /// Upload and instantiate the wasm at `wasm`, returning the new contract address.
    fn deploy(
        &self,
        wasm: &Path,
        identity: &str,
        network: &str,
    ) -> impl Future<Output = Result<String, ExecError>> + Send;

    /// Call `entrypoint` on the contract at `address`.
    fn invoke(
        &self,
        address: &str,
        identity: &str,
        network: &str,
        entrypoint: &str,
        args: &[InvokeArg],
    ) -> impl Future<Output = Result<(), ExecError>> + Send;

    /// Address of the network's native asset contract, the default payment token.
    fn native_token(&self, network: &str)
    -> impl Future<Output = Result<String, ExecError>> + Send;
}

/// Resolves a named identity to its account address.
pub trait IdentityProvider: Send + Sync {
    /// Resolve `identity`, creating it first if the provider supports it.
    fn resolve_address(
        &self,
        identity: &str,
        network: &str,
    ) -> impl Future<Output = Result<String, ExecError>> + Send;
}
