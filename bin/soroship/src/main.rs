//! soroship deploys a set of Soroban contracts to a Stellar network and initializes them,
//! skipping whatever a previous run already did.

mod cli;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command, ManifestArgs, OutputFormat, PlanArgs, RunArgs, StatusArgs};
use soroship_deploy::{
    DeployError, DeploymentPlan, JsonFileStore, MANIFEST_FILENAME, Manifest, Orchestrator,
    ParamSource, StateStore, StellarCli,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Status(args) => status(args).map(|_| ExitCode::SUCCESS),
        Command::Plan(args) => plan(args).map(|_| ExitCode::SUCCESS),
    }
}

/// The explicit manifest, else `./Soroship.toml`, else the built-in contract set.
fn load_manifest(args: &ManifestArgs) -> Result<Manifest> {
    if let Some(path) = &args.manifest {
        return Manifest::load_from_file(path);
    }

    let local = PathBuf::from(MANIFEST_FILENAME);
    if local.is_file() {
        return Manifest::load_from_file(&local);
    }

    tracing::debug!("No manifest found, using the built-in contract set");
    Ok(Manifest::default())
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let manifest = load_manifest(&args.manifest)?;
    let config = args.run_config();

    // Validate before building or touching the network.
    let orchestrator = Orchestrator::new(manifest.clone(), config)?;

    let client = StellarCli::new(&args.stellar_bin).timeout(args.call_timeout());

    if args.build {
        if args.dry_run {
            tracing::info!(workspace = %manifest.workspace.display(), "Dry run: skipping build");
        } else {
            client
                .build(&manifest.workspace)
                .await
                .map_err(DeployError::Build)?;
        }
    }

    let store = JsonFileStore::new(args.store.location());
    let outcome = orchestrator.run(&client, &client, &store).await?;

    match args.format {
        OutputFormat::Table => println!("{}", outcome.report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&outcome.report).context("Failed to serialize report")?
        ),
    }

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        let failed = outcome.states.failed().collect::<Vec<_>>();
        tracing::error!(failed = ?failed, "Run finished with failures");
        Ok(ExitCode::FAILURE)
    }
}

fn status(args: StatusArgs) -> Result<()> {
    let network = &args.store.network;
    let store = JsonFileStore::new(args.store.location());
    let records = store.load_all(network)?;

    match args.format {
        OutputFormat::Table => {
            if records.is_empty() {
                println!("No deployments recorded for {network}");
                return Ok(());
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["Artifact", "Address"]);
            for (name, address) in &records {
                table.add_row(vec![name.as_str(), address.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&records).context("Failed to serialize records")?
        ),
    }

    Ok(())
}

fn plan(args: PlanArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let plan = DeploymentPlan::new(manifest.artifacts.clone())?;

    match args.format {
        OutputFormat::Table => println!("{}", plan_table(&plan)),
        OutputFormat::Json => {
            let init_order = plan.init_order().map(|a| a.name.as_str()).collect::<Vec<_>>();
            let value = serde_json::json!({
                "deployOrder": plan.artifacts(),
                "initOrder": init_order,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("Failed to serialize plan")?
            );
        }
    }

    Ok(())
}

/// One row per artifact, in init order, with its deploy position and parameter sources.
fn plan_table(plan: &DeploymentPlan) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Init", "Deploy", "Artifact", "Wasm", "Initializer"]);

    for (init_index, artifact) in plan.init_order().enumerate() {
        let deploy_index = plan
            .artifacts()
            .iter()
            .position(|a| a.name == artifact.name)
            .map(|i| (i + 1).to_string())
            .unwrap_or_default();

        let call = if artifact.initialize {
            std::iter::once(artifact.entrypoint.clone())
                .chain(
                    artifact
                        .init
                        .iter()
                        .map(|p| format!("--{} {}", p.arg, describe_source(&p.source))),
                )
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            "-".to_string()
        };

        table.add_row(vec![
            (init_index + 1).to_string(),
            deploy_index,
            artifact.name.clone(),
            display_path(&artifact.wasm),
            call,
        ]);
    }

    table
}

fn describe_source(source: &ParamSource) -> String {
    match source {
        ParamSource::Literal(value) => value.clone(),
        ParamSource::Admin => "<admin>".to_string(),
        ParamSource::AdminList => "[<admin>]".to_string(),
        ParamSource::Token => "<token>".to_string(),
        ParamSource::Artifact(name) => format!("<{name}>"),
    }
}

fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
