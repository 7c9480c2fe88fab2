pub mod cache;
pub mod models;
pub mod record;
pub mod stages;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{AppConfig, ModelSettings};
use crate::db::{Database, DbError, DuckDb};
use crate::llm::prompts::{PromptRenderer, PromptStrategy};
use crate::llm::{build_backend, CompletionBackend, LlmError};
use cache::{CacheEntry, QueryCache};
use models::QueryResponse;
use record::{DailyRecordSink, ExecutionLog, RecordError, RecordSink, RunRecord};

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CacheCheck,
    Generating,
    Executing,
    Synthesizing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CacheCheck => "cache_check",
            Stage::Generating => "generating",
            Stage::Executing => "executing",
            Stage::Synthesizing => "synthesizing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A failure inside one run. These are contained: the caller sees them as
/// an error-bearing answer, never as an `Err`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to describe schema: {0}")]
    Schema(#[source] DbError),
    #[error("SQL generation failed: {0}")]
    Generation(#[source] LlmError),
    #[error("{0}")]
    Execution(#[source] DbError),
    #[error("Answer synthesis failed: {0}")]
    Synthesis(#[source] LlmError),
    #[error("Failed to render prompt: {source}")]
    Prompt {
        stage: Stage,
        #[source]
        source: minijinja::Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Schema(_) | PipelineError::Generation(_) => Stage::Generating,
            PipelineError::Execution(_) => Stage::Executing,
            PipelineError::Synthesis(_) => Stage::Synthesizing,
            PipelineError::Prompt { stage, .. } => *stage,
        }
    }
}

/// Failures that leave no usable pipeline behind.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Database setup failed: {0}")]
    Database(#[from] DbError),
    #[error("LLM setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Execution record setup failed: {0}")]
    Records(#[from] RecordError),
}

/// Model and prompt choices fixed for the lifetime of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sql_model: ModelSettings,
    pub nlp_model: ModelSettings,
    pub prompt_strategy: PromptStrategy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sql_model: config.llm.sql_model.clone(),
            nlp_model: config.llm.nlp_model.clone(),
            prompt_strategy: config.pipeline.prompt_strategy,
        }
    }
}

/// Question in, answer out: generation, execution and synthesis run in
/// strict sequence behind a cache check. One question at a time.
pub struct Pipeline {
    database: Arc<dyn Database>,
    backend: Arc<dyn CompletionBackend>,
    settings: PipelineSettings,
    prompts: PromptRenderer,
    cache: QueryCache,
    sink: Arc<dyn RecordSink>,
}

impl Pipeline {
    pub fn new(
        database: Arc<dyn Database>,
        backend: Arc<dyn CompletionBackend>,
        settings: PipelineSettings,
        cache: QueryCache,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        let prompts = PromptRenderer::new(settings.prompt_strategy);
        Self {
            database,
            backend,
            settings,
            prompts,
            cache,
            sink,
        }
    }

    /// Connects to the database and checks that its schema can be read
    /// before handing out a pipeline.
    pub async fn from_config(config: &AppConfig, use_cache: bool) -> Result<Self, SetupError> {
        let database = DuckDb::connect(&config.database)?;
        let schema = database.describe_schema().await?;
        debug!("Schema description is {} bytes", schema.len());

        info!("Initializing LLM backend: {}", config.llm.backend);
        let backend = build_backend(&config.llm)?;

        let cache = QueryCache::open(&config.cache.path, use_cache && config.cache.enabled);
        info!(
            "Query cache {} ({} entries)",
            if cache.is_enabled() { "enabled" } else { "disabled" },
            cache.len()
        );

        let sink = DailyRecordSink::new(&config.logging.dir)?;

        Ok(Self::new(
            Arc::new(database),
            backend,
            PipelineSettings::from_config(config),
            cache,
            Arc::new(sink),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        info!("Query cache cleared");
    }

    /// Answers one question. Per-run failures come back as a response whose
    /// answer starts with `Error:`.
    pub async fn ask(&mut self, question: &str) -> QueryResponse {
        debug!(stage = %Stage::CacheCheck, "Checking cache");
        if let Some(entry) = self.cache.get(question) {
            info!("Processing: {} (cached)", question);
            return QueryResponse::from_cache(question, entry);
        }

        info!("Processing: {}", question);
        let mut record = RunRecord::start(
            ExecutionLog::new(
                question,
                &self.settings.sql_model.model,
                &self.settings.nlp_model.model,
            ),
            Arc::clone(&self.sink),
        );

        match self.run_stages(question, record.log_mut()).await {
            Ok(entry) => {
                record.log_mut().success = true;
                self.cache.set(question, entry);
                debug!(stage = %Stage::Done, "Run succeeded");
            }
            Err(e) => {
                let failed_at = e.stage();
                error!("Pipeline error while {}: {}", failed_at, e);

                let log = record.log_mut();
                log.failed_stage = Some(failed_at);
                log.error = Some(e.to_string());
                log.final_answer = Some(format!("Error: {}", e));
                debug!(stage = %Stage::Failed, "Run failed");
            }
        }

        let log = record.finish();
        info!(
            "Finished in {:.2}s (success={})",
            log.total_duration, log.success
        );
        QueryResponse::from_log(&log)
    }

    async fn run_stages(
        &self,
        question: &str,
        log: &mut ExecutionLog,
    ) -> Result<CacheEntry, PipelineError> {
        let sql = self.generate_sql(question, log).await?;
        let result = self.execute_query(&sql, log).await?;
        let answer = self.synthesize_answer(question, &sql, &result, log).await?;

        Ok(CacheEntry {
            answer,
            sql_query: sql,
        })
    }
}
