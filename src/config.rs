use clap::{Args, Parser, Subcommand};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::llm::prompts::PromptStrategy;

pub const DEFAULT_QUESTION: &str = "Which customer has placed the least orders?";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: usize,
    pub read_only: bool,
    /// Rows per table included in the schema description sent to the SQL model
    pub sample_rows: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "northwind.duckdb".to_string(),
            pool_size: 2,
            read_only: true,
            sample_rows: 2,
        }
    }
}

/// Defaults differ per role, see [`LlmConfig::default`].
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: String, // "ollama" or "remote"
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: Option<u64>,
    /// Near-deterministic settings for SQL generation
    pub sql_model: ModelSettings,
    /// Conversational settings for answer synthesis
    pub nlp_model: ModelSettings,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "ollama".to_string(),
            api_url: None,
            api_key: None,
            request_timeout_secs: None,
            sql_model: ModelSettings::new("qwen2.5-coder:7b", 0.0),
            nlp_model: ModelSettings::new("smollm2:latest", 0.3),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub prompt_strategy: PromptStrategy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("query_cache.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    /// Emit console lines as JSON instead of the compact text format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            json: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub web: WebConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Answer questions about a database in plain language", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the DuckDB database file
    #[arg(long, value_name = "PATH", global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a single question and print the answer
    Ask(AskArgs),
    /// Serve the pipeline over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub struct AskArgs {
    /// The question to answer
    pub question: Option<String>,

    /// Disable caching for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Clear the existing cache before running
    #[arg(long)]
    pub clear_cache: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Disable caching for every request
    #[arg(long)]
    pub no_cache: bool,
}

fn copilot_environment() -> Environment {
    // COPILOT_LLM__SQL_MODEL__MODEL=... style overrides
    Environment::with_prefix("COPILOT")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Seeds the per-role model defaults into the builder so a source that sets
/// only `model` or only `temperature` keeps the other.
fn with_model_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = LlmConfig::default();
    builder
        .set_default("llm.sql_model.model", defaults.sql_model.model)?
        .set_default("llm.sql_model.temperature", f64::from(defaults.sql_model.temperature))?
        .set_default("llm.nlp_model.model", defaults.nlp_model.model)?
        .set_default("llm.nlp_model.temperature", f64::from(defaults.nlp_model.temperature))
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        Self::with_environment(args, copilot_environment())
    }

    fn with_environment(args: &CliArgs, environment: Environment) -> Result<Self, ConfigError> {
        let mut config_builder = with_model_defaults(Config::builder())?;

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = [
                "config.toml",
                "config/config.toml",
                "/etc/sql-copilot/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder.add_source(environment);

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }
        if let Some(Command::Serve(serve)) = &args.command {
            if let Some(host) = &serve.host {
                config.web.host = host.clone();
            }
            if let Some(port) = serve.port {
                config.web.port = port;
            }
        }

        Ok(config)
    }

    /// Loads a configuration from a TOML string on top of the defaults.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        with_model_defaults(Config::builder())?
            .add_source(File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
