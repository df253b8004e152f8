use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use testsuite::{TestSuiteWorkflow, WorkflowConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testsuite")]
#[command(about = "Run data quality test suites against a metadata catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow described by a config file
    Run {
        /// Workflow config file (.yaml, .yml, .json or .toml)
        #[arg(short, long)]
        config: PathBuf,
        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },
    /// Parse and validate a workflow config file
    Validate {
        /// Workflow config file (.yaml, .yml, .json or .toml)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, strict } => {
            let code = run(&config, strict).await?;
            std::process::exit(code);
        }
        Commands::Validate { config } => {
            let workflow_config = WorkflowConfig::from_file(&config)?;
            init_tracing(&workflow_config);
            workflow_config.validate()?;
            println!(
                "{} is valid: {} test suites declared",
                config.display(),
                workflow_config.test_suites().len()
            );
        }
    }

    Ok(())
}

fn init_tracing(config: &WorkflowConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.workflow_config.logger_level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(path: &Path, strict: bool) -> Result<i32, Box<dyn std::error::Error>> {
    let config = WorkflowConfig::from_file(path)?;
    init_tracing(&config);
    info!("Loaded workflow config from {}", path.display());

    let mut workflow = TestSuiteWorkflow::create(config).await?;
    if let Err(e) = workflow.run().await {
        error!("Workflow failed: {}", e);
        return Err(e.into());
    }

    let code = workflow.print_status(strict);
    if let Err(e) = workflow.raise_from_status(strict) {
        error!("{}", e);
    }
    Ok(code)
}
