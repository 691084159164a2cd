use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use config::Config;
use skyquery::agent::{ExecutionLoop, LlmReasoner};
use skyquery::environment::EnvironmentManager;
use skyquery::llm::{AnthropicClient, LlmClient};
use skyquery::session::InteractiveSession;
use skyquery::tools::{ToolContext, ToolRegistry};

fn setup_logging(level: Option<&str>) -> Result<PathBuf> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skyquery")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("skyquery.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    let mode = cli.mode();
    info!("Starting application in {} mode", mode.label());
    println!("Starting skyquery with {} environment...", mode.label().cyan());

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  Region: {}", config.aws.region);
        println!("  Model: {}", config.llm.model);
        println!("  Max iterations: {}", config.agent.max_iterations);
    }

    let environment = EnvironmentManager::new(mode, config.aws_cli())
        .activate()
        .context("Failed to activate environment")?;

    let client = Arc::new(AnthropicClient::new(config.anthropic()).context("Failed to initialize chatbot")?);
    info!("Reasoning engine ready: {}", client.model());

    let registry = ToolRegistry::inspection_catalog(ToolContext::new(environment.backend()))
        .context("Failed to build tool catalog")?;
    let reasoner = LlmReasoner::with_limits(client.clone(), config.llm.max_tokens, config.llm.temperature);
    let execution = ExecutionLoop::with_config(Arc::new(reasoner), Arc::new(registry), config.loop_config(mode));
    let session = InteractiveSession::new(execution, mode.label());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let summary = session.run(stdin, &mut stdout).await.context("Session I/O failed")?;

    environment.deactivate();

    let usage = client.total_usage();
    info!(
        "Session finished: {} queries, tokens in={} out={}",
        summary.queries, usage.input_tokens, usage.output_tokens
    );

    if cli.is_verbose() {
        println!(
            "{} {} queries, {} answered, {} incomplete, {} failed",
            "Session summary:".green(),
            summary.queries,
            summary.answered,
            summary.incomplete,
            summary.failed
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref())
        .context("Failed to load configuration")?
        .with_region(cli.region.as_deref());

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // Pick up ANTHROPIC_API_KEY and friends from .env
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e).context("Failed to read .env file"),
    }

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
