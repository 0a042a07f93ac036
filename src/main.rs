use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nestschema::core::config::Config;
use nestschema::core::metrics::compare_versions;
use nestschema::core::store::JsonFileStore;
use nestschema::core::versioning::submodel_membership;
use nestschema::core::{Diagram, SchemaError, VersionSync};

#[derive(Parser)]
#[command(
    name = "nestschema",
    version,
    about = "Submodels and design metrics of NoSQL schema versions"
)]
struct Cli {
    /// JSON file holding an array of solutions (defaults to NESTSCHEMA_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the metrics of every version of a solution
    Report {
        #[arg(long)]
        solution: String,
    },
    /// Print the submodels of one version
    Partition {
        #[arg(long)]
        solution: String,
        #[arg(long)]
        version: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("No store configured: pass --store or set NESTSCHEMA_STORE_PATH")]
    MissingStore,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match run(cli, config).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<String, CliError> {
    let path = config
        .resolve_store_path(cli.store)
        .ok_or(CliError::MissingStore)?;
    tracing::info!("Using store {}", path.display());

    let sync = VersionSync::with_config(JsonFileStore::new(path), &config);

    match cli.command {
        Command::Report { solution } => {
            let solution = sync.load_solution(&solution).await?;
            let rows = compare_versions(&solution);
            Ok(serde_json::to_string_pretty(&rows)?)
        }
        Command::Partition { solution, version } => {
            let mut diagram = Diagram::new();
            sync.load(&solution, &version, &mut diagram).await?;
            let membership = submodel_membership(diagram.nodes(), diagram.edges());
            Ok(serde_json::to_string_pretty(&membership)?)
        }
    }
}
