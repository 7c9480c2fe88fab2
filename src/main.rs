use anyhow::{anyhow, Context};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use sql_copilot::config::{AppConfig, AskArgs, CliArgs, Command, DEFAULT_QUESTION};
use sql_copilot::pipeline::cache::QueryCache;
use sql_copilot::pipeline::Pipeline;
use sql_copilot::util::logging::init_tracing;
use sql_copilot::web;
use sql_copilot::web::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up COPILOT_* overrides from a local .env before the config is read
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = AppConfig::new(&args).context("Failed to load configuration")?;

    init_tracing(&config.logging).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    match args.command {
        Some(Command::Serve(serve)) => run_serve(config, serve.no_cache).await,
        Some(Command::Ask(ask)) => run_ask(config, ask).await,
        None => run_ask(config, AskArgs::default()).await,
    }
}

async fn run_ask(config: AppConfig, args: AskArgs) -> anyhow::Result<()> {
    if args.clear_cache {
        QueryCache::open(&config.cache.path, true).clear();
        println!("Cache cleared.");
    }

    println!("\n{}", "=".repeat(50));
    println!("Welcome to SQL Copilot");
    println!("{}\n", "=".repeat(50));

    let use_cache = !args.no_cache;
    let mut pipeline = match Pipeline::from_config(&config, use_cache).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Failed to initialize pipeline: {}", e);
            return Err(e).context("Failed to initialize pipeline");
        }
    };

    let question = args.question.as_deref().unwrap_or(DEFAULT_QUESTION);
    println!("Processing question: {}...\n", question);

    let response = pipeline.ask(question).await;

    println!("{}", response.summary());
    println!("\nCheck {}/ for detailed execution records.\n", config.logging.dir.display());

    Ok(())
}

async fn run_serve(config: AppConfig, no_cache: bool) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(&config, !no_cache)
        .await
        .context("Failed to initialize pipeline")?;
    let app_state = Arc::new(AppState::new(pipeline));

    info!("Starting SQL Copilot server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(anyhow!("Server error: {}", e));
        }
    }

    Ok(())
}
