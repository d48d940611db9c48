use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use soroship_deploy::{
    DEFAULT_IDENTITY, DEFAULT_NETWORK, RunConfig, StateLocation,
    client::{DEFAULT_CALL_TIMEOUT, DEFAULT_STELLAR_BIN},
    state::DEFAULT_STATE_DIR,
};
use tracing::level_filters::LevelFilter;

/// How results are printed to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "soroship")]
#[command(
    author,
    version,
    about = "Deploy and initialize a set of Soroban contracts, idempotently"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "SOROSHIP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy every artifact that has no recorded address, then initialize them.
    Run(RunArgs),
    /// Print the recorded addresses for a network.
    Status(StatusArgs),
    /// Print the deploy and init order without touching the network.
    Plan(PlanArgs),
}

/// Where the manifest comes from.
#[derive(Debug, Clone, Args)]
pub struct ManifestArgs {
    /// Path to a Soroship.toml manifest, or a directory containing one.
    ///
    /// If not provided, ./Soroship.toml is used when present, otherwise the built-in
    /// platform contract set.
    #[arg(long, env = "SOROSHIP_MANIFEST")]
    pub manifest: Option<PathBuf>,
}

/// Which network, and where its state lives.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// The target network.
    #[arg(short, long, env = "SOROSHIP_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Directory holding one `<network>.json` state file per network.
    #[arg(long, env = "SOROSHIP_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// A single state file to use instead of the state directory.
    ///
    /// The file is pinned to the network it was first written for.
    #[arg(long, env = "SOROSHIP_STATE_FILE", conflicts_with = "state_dir")]
    pub state_file: Option<PathBuf>,
}

impl StoreArgs {
    pub fn location(&self) -> StateLocation {
        match &self.state_file {
            Some(file) => StateLocation::File(file.clone()),
            None => StateLocation::Directory(self.state_dir.clone()),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    #[clap(flatten)]
    pub manifest: ManifestArgs,

    /// The stellar identity that signs deploys and init calls.
    #[arg(short, long, env = "SOROSHIP_IDENTITY", default_value = DEFAULT_IDENTITY)]
    pub identity: String,

    /// Redeploy artifacts even when an address is already recorded.
    #[arg(long, env = "SOROSHIP_FORCE", default_value_t = false)]
    pub force: bool,

    /// Report what would happen without any network call or state write.
    #[arg(long, env = "SOROSHIP_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Token address passed to initializers that take one.
    ///
    /// If not provided, the manifest's `[tokens]` entry for the network is used, then the
    /// network's native asset contract.
    #[arg(long, env = "SOROSHIP_TOKEN")]
    pub token: Option<String>,

    /// Restrict the run to these artifacts (repeatable or comma-separated).
    #[arg(long, env = "SOROSHIP_ONLY", value_delimiter = ',')]
    pub only: Vec<String>,

    /// Run `stellar contract build` in the manifest's workspace before deploying.
    #[arg(long, env = "SOROSHIP_BUILD", default_value_t = false)]
    pub build: bool,

    /// Path to the stellar CLI binary.
    #[arg(long, env = "SOROSHIP_STELLAR_BIN", default_value = DEFAULT_STELLAR_BIN)]
    pub stellar_bin: PathBuf,

    /// Upper bound on a single stellar CLI call, in seconds.
    #[arg(long, env = "SOROSHIP_CALL_TIMEOUT", default_value_t = DEFAULT_CALL_TIMEOUT.as_secs())]
    pub call_timeout: u64,

    /// Output format of the run report.
    #[arg(long, env = "SOROSHIP_FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl RunArgs {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            network: self.store.network.clone(),
            identity: self.identity.clone(),
            force: self.force,
            dry_run: self.dry_run,
            token: self.token.clone(),
            only: self.only.iter().cloned().collect::<BTreeSet<_>>(),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout)
    }
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Output format.
    #[arg(long, env = "SOROSHIP_FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    #[clap(flatten)]
    pub manifest: ManifestArgs,

    /// Output format.
    #[arg(long, env = "SOROSHIP_FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}
