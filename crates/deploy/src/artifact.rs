//! Artifact manifest: the ordered list of contracts to deploy and how to initialize them.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The default name for the manifest file.
pub const MANIFEST_FILENAME: &str = "Soroship.toml";

/// The default init entrypoint of a Soroban contract.
pub const DEFAULT_ENTRYPOINT: &str = "initialize";

/// Rejection messages that mean the initializer already ran.
///
/// Matched as a case-insensitive substring of the CLI's stderr. Contracts built without
/// panic messages in the wasm report a re-init as a bare trap such as
/// `Error(WasmVm, InvalidAction)`, which this default does not match. Manifests for such
/// contracts list their own `benign_rejections`, such as a contract error code.
pub const DEFAULT_BENIGN_REJECTIONS: &[&str] = &["already initialized"];

/// Where the value of one init argument comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamSource {
    /// Passed through verbatim.
    Literal(String),
    /// The deploying identity's address.
    Admin,
    /// A JSON array holding only the deploying identity's address.
    AdminList,
    /// The payment token address for the network.
    Token,
    /// The deployed address of another artifact in the manifest.
    Artifact(String),
}

/// A named argument passed to the init entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitParam {
    pub arg: String,
    pub source: ParamSource,
}

impl InitParam {
    pub fn new(arg: impl Into<String>, source: ParamSource) -> Self {
        Self {
            arg: arg.into(),
            source,
        }
    }

    pub fn admin(arg: impl Into<String>) -> Self {
        Self::new(arg, ParamSource::Admin)
    }

    pub fn token(arg: impl Into<String>) -> Self {
        Self::new(arg, ParamSource::Token)
    }

    pub fn literal(arg: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(arg, ParamSource::Literal(value.into()))
    }

    pub fn artifact(arg: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::new(arg, ParamSource::Artifact(artifact.into()))
    }

    /// The artifact this parameter depends on, if any.
    pub fn referenced_artifact(&self) -> Option<&str> {
        match &self.source {
            ParamSource::Artifact(name) => Some(name),
            _ => None,
        }
    }
}

fn default_entrypoint() -> String {
    DEFAULT_ENTRYPOINT.to_string()
}

fn default_true() -> bool {
    true
}

/// One deployable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Unique, stable key used in the state file.
    pub name: String,
    /// Path to the compiled `.wasm`.
    pub wasm: PathBuf,
    /// Init entrypoint name.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    /// Whether the init phase calls the entrypoint at all.
    #[serde(default = "default_true")]
    pub initialize: bool,
    /// Ordered init arguments.
    #[serde(default)]
    pub init: Vec<InitParam>,
}

impl ArtifactSpec {
    pub fn new(name: impl Into<String>, wasm: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            wasm: wasm.into(),
            entrypoint: default_entrypoint(),
            initialize: true,
            init: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: InitParam) -> Self {
        self.init.push(param);
        self
    }

    pub fn without_init(mut self) -> Self {
        self.initialize = false;
        self
    }

    /// Names of the artifacts whose addresses this one needs at init time.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.init.iter().filter_map(InitParam::referenced_artifact)
    }

    /// SHA-256 of the wasm binary, or `None` if it cannot be read (e.g. not built yet).
    pub fn wasm_hash(&self) -> Option<String> {
        let bytes = std::fs::read(&self.wasm).ok()?;
        Some(hex::encode(Sha256::digest(&bytes)))
    }
}

/// The full manifest as stored in `Soroship.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Contracts workspace used by `stellar contract build`.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Rejection messages treated as "already done" by the init phase.
    #[serde(default = "default_benign_rejections")]
    pub benign_rejections: Vec<String>,
    /// Per-network token addresses. Networks missing here use the native asset contract.
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
    /// Artifacts in deploy order.
    #[serde(rename = "artifact", default)]
    pub artifacts: Vec<ArtifactSpec>,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_benign_rejections() -> Vec<String> {
    DEFAULT_BENIGN_REJECTIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn wasm_path(crate_name: &str) -> PathBuf {
    PathBuf::from("target/wasm32-unknown-unknown/release")
        .join(format!("{}.wasm", crate_name.replace('-', "_")))
}

impl Default for Manifest {
    /// The platform contracts, in deploy order.
    ///
    /// The governance-dao argument names (`voting_period` through `execution_delay`) and
    /// their values are assumed from the positional call in the contract's own tests; check
    /// them against the deployed wasm's interface and override them in `Soroship.toml`.
    fn default() -> Self {
        let artifacts = vec![
            ArtifactSpec::new("governance-token", wasm_path("governance-token"))
                .with_param(InitParam::admin("admin")),
            ArtifactSpec::new("governance-dao", wasm_path("governance-dao"))
                .with_param(InitParam::admin("admin"))
                .with_param(InitParam::artifact("token", "governance-token"))
                .with_param(InitParam::literal("voting_period", "17280"))
                .with_param(InitParam::literal("grace_period", "86400"))
                .with_param(InitParam::literal("min_proposal_power", "0"))
                .with_param(InitParam::literal("quorum_percentage", "51"))
                .with_param(InitParam::literal("execution_delay", "0")),
            ArtifactSpec::new("multisig-treasury", wasm_path("multisig-treasury"))
                .with_param(InitParam::admin("admin"))
                .with_param(InitParam::new("initial_signers", ParamSource::AdminList))
                .with_param(InitParam::literal("required", "1")),
            ArtifactSpec::new("publisher-verification", wasm_path("publisher-verification"))
                .with_param(InitParam::admin("admin")),
            ArtifactSpec::new("publisher-reputation", wasm_path("publisher-reputation"))
                .with_param(InitParam::admin("admin"))
                .with_param(InitParam::admin("oracle")),
            ArtifactSpec::new("refund-processor", wasm_path("refund-processor"))
                .with_param(InitParam::admin("admin"))
                .with_param(InitParam::token("token")),
        ];

        Self {
            workspace: default_workspace(),
            benign_rejections: default_benign_rejections(),
            tokens: BTreeMap::new(),
            artifacts,
        }
    }
}

impl Manifest {
    /// Load a manifest from a TOML file, or from `Soroship.toml` inside a directory.
    ///
    /// Relative wasm and workspace paths are resolved against the manifest's directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Manifest file or directory not found: {}", path.display());
        }

        let manifest_path = if path.is_dir() {
            path.join(MANIFEST_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read manifest from {}", manifest_path.display()))?;
        let manifest: Self =
            toml::from_str(&content).context("Failed to parse manifest file as TOML")?;

        let base = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        tracing::info!(
            path = %manifest_path.display(),
            artifacts = manifest.artifacts.len(),
            "Manifest loaded"
        );

        Ok(manifest.rebase(&base))
    }

    /// Resolve relative paths against `base`.
    pub fn rebase(mut self, base: &Path) -> Self {
        if self.workspace.is_relative() {
            self.workspace = base.join(&self.workspace);
        }
        for artifact in &mut self.artifacts {
            if artifact.wasm.is_relative() {
                artifact.wasm = base.join(&artifact.wasm);
            }
        }
        self
    }

    /// The configured token address for `network`, if any.
    pub fn token_for(&self, network: &str) -> Option<String> {
        self.tokens.get(network).cloned()
    }

    /// Whether a rejection message means the initializer already ran.
    pub fn is_benign_rejection(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.benign_rejections
            .iter()
            .any(|pattern| message.contains(&pattern.to_lowercase()))
    }
}
