//! [`ExecutionClient`] and [`IdentityProvider`] backed by the `stellar` CLI.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::process::Command;

use super::{ExecutionClient, IdentityProvider, InvokeArg, StellarCmdBuilder};
use crate::ExecError;

/// Default program name of the Stellar CLI.
pub const DEFAULT_STELLAR_BIN: &str = "stellar";

/// Default upper bound on one CLI call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Fragments of CLI stderr that mean the network was never reached.
const TRANSPORT_SIGNATURES: &[&str] = &[
    "error sending request",
    "connection refused",
    "connection reset",
    "dns error",
    "failed to lookup address",
    "timed out",
    "tls handshake",
    "502 bad gateway",
    "503 service unavailable",
    "504 gateway timeout",
    "networking or low-level protocol error",
];

/// Captured result of one CLI call that ran to completion.
#[derive(Debug)]
struct CmdOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Runs `stellar` as a child process.
#[derive(Debug, Clone)]
pub struct StellarCli {
    program: PathBuf,
    timeout: Duration,
}

impl Default for StellarCli {
    fn default() -> Self {
        Self::new(DEFAULT_STELLAR_BIN)
    }
}

impl StellarCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the contracts workspace at `workspace`.
    pub async fn build(&self, workspace: &Path) -> Result<(), ExecError> {
        tracing::info!(workspace = %workspace.display(), "Building contracts...");
        let output = self
            .run(StellarCmdBuilder::build().build_args(), Some(workspace))
            .await?;
        into_result(output).map(|_| ())
    }

    async fn run(&self, args: Vec<String>, cwd: Option<&Path>) -> Result<CmdOutput, ExecError> {
        tracing::debug!(program = %self.program.display(), args = ?args, "Running stellar command");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|e| {
            ExecError::TransportFailure(format!(
                "failed to spawn {}: {e}",
                self.program.display()
            ))
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ExecError::TransportFailure(format!(
                    "{} timed out after {}s",
                    args.first().map(String::as_str).unwrap_or("command"),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| ExecError::TransportFailure(format!("failed to wait for command: {e}")))?;

        let output = CmdOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::trace!(
            success = output.success,
            stderr = %output.stderr,
            "Stellar command finished"
        );
        Ok(output)
    }
}

impl ExecutionClient for StellarCli {
    async fn deploy(
        &self,
        wasm: &Path,
        identity: &str,
        network: &str,
    ) -> Result<String, ExecError> {
        let args = StellarCmdBuilder::deploy(wasm)
            .source_account(identity)
            .network(network)
            .build_args();
        let stdout = into_result(self.run(args, None).await?)?;

        parse_contract_id(&stdout).ok_or_else(|| {
            ExecError::TransportFailure(format!(
                "no contract id in deploy output: {}",
                stdout.trim()
            ))
        })
    }

    async fn invoke(
        &self,
        address: &str,
        identity: &str,
        network: &str,
        entrypoint: &str,
        args: &[InvokeArg],
    ) -> Result<(), ExecError> {
        let args = StellarCmdBuilder::invoke(address, entrypoint, args)
            .source_account(identity)
            .network(network)
            .build_args();
        into_result(self.run(args, None).await?).map(|_| ())
    }

    async fn native_token(&self, network: &str) -> Result<String, ExecError> {
        let args = StellarCmdBuilder::asset_id("native")
            .network(network)
            .build_args();
        let stdout = into_result(self.run(args, None).await?)?;

        parse_contract_id(&stdout).ok_or_else(|| {
            ExecError::TransportFailure(format!(
                "no contract id in asset id output: {}",
                stdout.trim()
            ))
        })
    }
}

impl IdentityProvider for StellarCli {
    async fn resolve_address(&self, identity: &str, network: &str) -> Result<String, ExecError> {
        let lookup = || async {
            let output = self
                .run(StellarCmdBuilder::keys_address(identity).build_args(), None)
                .await?;
            Ok::<_, ExecError>(
                output
                    .success
                    .then(|| parse_account_id(&output.stdout))
                    .flatten(),
            )
        };

        if let Some(address) = lookup().await? {
            return Ok(address);
        }

        tracing::info!(identity, network, "Identity not found, generating a new key...");
        let args = StellarCmdBuilder::keys_generate(identity)
            .network(network)
            .build_args();
        into_result(self.run(args, None).await?)?;

        lookup().await?.ok_or_else(|| {
            ExecError::RemoteRejected(format!(
                "identity `{identity}` has no address after generation"
            ))
        })
    }
}

/// Map a completed call to its stdout, or to the matching error class.
fn into_result(output: CmdOutput) -> Result<String, ExecError> {
    if output.success {
        return Ok(output.stdout);
    }
    Err(classify_failure(&output.stderr))
}

/// Decide whether a failed call reached the network.
fn classify_failure(stderr: &str) -> ExecError {
    let message = stderr.trim().to_string();
    let lower = message.to_lowercase();
    if TRANSPORT_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        ExecError::TransportFailure(message)
    } else {
        ExecError::RemoteRejected(message)
    }
}

/// Extract a contract strkey (`C...`, 56 chars) from the last non-empty line of output.
fn parse_contract_id(stdout: &str) -> Option<String> {
    parse_strkey(stdout, 'C')
}

/// Extract an account strkey (`G...`, 56 chars) from the last non-empty line of output.
fn parse_account_id(stdout: &str) -> Option<String> {
    parse_strkey(stdout, 'G')
}

fn parse_strkey(stdout: &str, prefix: char) -> Option<String> {
    let line = stdout.lines().map(str::trim).rfind(|l| !l.is_empty())?;
    let valid = line.len() == 56
        && line.starts_with(prefix)
        && line
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c));
    valid.then(|| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FSQN2VQ7LYDPO3MAO";
    const ACCOUNT: &str = "GDAT5HWTGIU4TSSZ4752OUC4SABDLTLZFRPZUJ3D6LKBNEPA7V2CIG54";

    #[test]
    fn test_parse_contract_id() {
        let stdout = format!("ℹ️ Simulating deploy transaction…\n✅ Deployed!\n{CONTRACT}\n\n");
        assert_eq!(parse_contract_id(&stdout).as_deref(), Some(CONTRACT));
        assert_eq!(parse_contract_id(CONTRACT).as_deref(), Some(CONTRACT));
    }

    #[test]
    fn test_parse_contract_id_rejects_garbage() {
        assert_eq!(parse_contract_id(""), None);
        assert_eq!(parse_contract_id("Deployed!"), None);
        assert_eq!(parse_contract_id(ACCOUNT), None);
        assert_eq!(parse_contract_id(&CONTRACT.to_lowercase()), None);
        assert_eq!(parse_contract_id(&CONTRACT[..40]), None);
    }

    #[test]
    fn test_parse_account_id() {
        assert_eq!(parse_account_id(&format!("{ACCOUNT}\n")).as_deref(), Some(ACCOUNT));
        assert_eq!(parse_account_id(CONTRACT), None);
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("error: Networking or low-level protocol error: error sending request for url (https://soroban-testnet.stellar.org/)"),
            ExecError::TransportFailure(_)
        ));
        assert!(matches!(
            classify_failure("error: operation timed out"),
            ExecError::TransportFailure(_)
        ));

        let rejected = classify_failure(
            "error: transaction simulation failed: HostError: Error(WasmVm, InvalidAction)\n  \"already initialized\"\n",
        );
        assert!(matches!(&rejected, ExecError::RemoteRejected(msg) if msg.contains("already initialized")));
        assert!(!rejected.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_binary_is_transport_failure() {
        let cli = StellarCli::new("/nonexistent/stellar-cli-for-tests");
        let err = cli
            .deploy(Path::new("token.wasm"), "alice", "testnet")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        // `sleep 5` stands in for a hung CLI; the arguments are ignored past the first.
        let cli = StellarCli::new("sleep").timeout(Duration::from_millis(100));
        let err = cli.run(vec!["5".to_string()], None).await.unwrap_err();
        assert!(matches!(err, ExecError::TransportFailure(msg) if msg.contains("timed out")));
    }
}
