//! Lectern CLI
//!
//! The `lectern` command works offline against local JSON files.
//!
//! ## Commands
//!
//! - `ids`: derive draft, base and version ids
//! - `plan`: show the transaction a mutation batch turns into
//! - `simulate`: commit a mutation batch against an in-memory repository

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lectern_core::identity::{draft_id, normalize_base_id, version_id};
use lectern_core::obs::OperationSpan;
use lectern_core::{build_transaction, Gateway, GatewayConfig, Mutation};
use lectern_store::fakes::MemoryContentLake;
use lectern_store::{Document, TransactionResult};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "lectern")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Content gateway tooling: ids, mutation plans and dry runs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive document ids
    Ids {
        #[command(subcommand)]
        action: IdsAction,
    },

    /// Print the ordered transaction built from a mutation file
    Plan {
        /// JSON array of mutations
        #[arg(short, long)]
        mutations: PathBuf,
    },

    /// Commit mutations against an in-memory copy of seed documents
    Simulate {
        /// JSON array of seed documents
        #[arg(short, long)]
        seed: PathBuf,

        /// JSON array of mutations
        #[arg(short, long)]
        mutations: PathBuf,

        /// Overrides LECTERN_PROJECT_ID
        #[arg(long)]
        project: Option<String>,

        /// Overrides LECTERN_DATASET
        #[arg(long)]
        dataset: Option<String>,
    },
}

#[derive(Subcommand)]
enum IdsAction {
    /// Draft id of a document
    Draft { id: String },
    /// Base id with any draft prefix removed
    Base { id: String },
    /// Version id of a document inside a release
    Version { release: String, id: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    transaction: TransactionResult,
    documents: Vec<Document>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    lectern_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Ids { action } => {
            println!("{}", cmd_ids(&action));
            Ok(())
        }
        Commands::Plan { mutations } => {
            let plan = cmd_plan(&mutations)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Commands::Simulate {
            seed,
            mutations,
            project,
            dataset,
        } => {
            let config = resolve_config(project, dataset)?;
            let report = cmd_simulate(config, &seed, &mutations).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn cmd_ids(action: &IdsAction) -> String {
    match action {
        IdsAction::Draft { id } => draft_id(normalize_base_id(id)),
        IdsAction::Base { id } => normalize_base_id(id).to_string(),
        IdsAction::Version { release, id } => version_id(release, normalize_base_id(id)),
    }
}

/// Flags win; anything not given on the command line comes from the environment.
fn resolve_config(project: Option<String>, dataset: Option<String>) -> Result<GatewayConfig> {
    if let (Some(project), Some(dataset)) = (&project, &dataset) {
        return Ok(GatewayConfig::new(project, dataset));
    }
    let mut config = GatewayConfig::from_env()
        .context("Pass --project and --dataset or set LECTERN_PROJECT_ID and LECTERN_DATASET")?;
    if let Some(project) = project {
        config.project_id = project;
    }
    if let Some(dataset) = dataset {
        config.dataset = dataset;
    }
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file: {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid {what} in {:?}", path))
}

fn cmd_plan(mutations_path: &Path) -> Result<lectern_store::Transaction> {
    let _span = OperationSpan::enter("plan", &mutations_path.display().to_string());
    let mutations: Vec<Mutation> = read_json(mutations_path, "mutations")?;
    let tx = build_transaction(&mutations).context("Mutation batch rejected")?;
    info!(operations = tx.len(), "transaction planned");
    Ok(tx)
}

async fn cmd_simulate(
    config: GatewayConfig,
    seed_path: &Path,
    mutations_path: &Path,
) -> Result<SimulationReport> {
    let seed: Vec<Document> = read_json(seed_path, "seed")?;
    let mutations: Vec<Mutation> = read_json(mutations_path, "mutations")?;

    let lake = Arc::new(MemoryContentLake::with_documents(seed));
    let gateway = Gateway::new(config, lake.clone(), lake.clone());
    let transaction = gateway
        .mutations()
        .modify_documents(mutations)
        .await
        .context("Simulation failed")?;

    lectern_core::metrics::METRICS.flush();
    Ok(SimulationReport {
        transaction,
        documents: lake.documents(),
    })
}
