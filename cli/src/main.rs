use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbqa_pipeline::{KbqaConfig, KbqaService, PipelineContext, Providers};
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kbqa")]
#[command(about = "Answer questions from a document knowledge base", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run agents in order over one context
    Run {
        /// Comma-separated agent names
        #[arg(long, value_delimiter = ',', required = true)]
        agents: Vec<String>,

        /// Context as JSON, e.g. '{"query": "What is a diode?"}'
        #[arg(long, default_value = "{}")]
        context: String,
    },
    /// Run a single agent
    Agent {
        name: String,

        #[arg(long, default_value = "{}")]
        context: String,
    },
    /// Replace the knowledge base with the document at URL
    Rebuild { url: String },
    /// List the available agents
    Agents,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", json!({ "error": format!("{e:#}") }));
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<Value> {
    let config = KbqaConfig::load(cli.config.as_deref()).context("loading config")?;
    let service = KbqaService::new(&config, Providers::from_config(&config)?)?;
    if service.restore().await {
        info!("Knowledge base restored from {}", config.knowledge.index_dir.display());
    }

    match cli.command {
        Command::Run { agents, context } => {
            let ctx = service.run(&agents, parse_context(&context)?).await?;
            Ok(serde_json::to_value(ctx)?)
        }
        Command::Agent { name, context } => {
            let ctx = service.run_agent(&name, parse_context(&context)?).await?;
            Ok(serde_json::to_value(ctx)?)
        }
        Command::Rebuild { url } => {
            let metadata = service.rebuild(&url).await?;
            Ok(serde_json::to_value(metadata)?)
        }
        Command::Agents => Ok(serde_json::to_value(service.orchestrator().registry().list())?),
    }
}

fn parse_context(raw: &str) -> Result<PipelineContext> {
    debug!("Parsing context {raw}");
    serde_json::from_str(raw).context("context must be a JSON object")
}
