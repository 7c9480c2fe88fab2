use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use super::Stage;

/// One structured record per non-cached run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub timestamp: DateTime<Local>,
    pub user_prompt: String,

    pub sql_model: String,
    pub nlp_model: String,

    pub sql_prompt: Option<String>,
    pub nlp_prompt: Option<String>,

    pub sql_query: Option<String>,
    pub result: Option<String>,
    pub final_answer: Option<String>,

    /// Seconds
    pub sql_generation_time: f64,
    pub query_execution_time: f64,
    pub answer_generation_time: f64,
    pub total_duration: f64,

    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub success: bool,
}

/// Error text recorded when a run is dropped before reaching an outcome.
pub const CANCELLED_ERROR: &str = "Run cancelled before completion";

impl ExecutionLog {
    /// The stage a run was in, judged by which outputs it has produced.
    pub fn current_stage(&self) -> Stage {
        if self.sql_query.is_none() {
            Stage::Generating
        } else if self.result.is_none() {
            Stage::Executing
        } else {
            Stage::Synthesizing
        }
    }

    pub fn new(user_prompt: &str, sql_model: &str, nlp_model: &str) -> Self {
        Self {
            timestamp: Local::now(),
            user_prompt: user_prompt.to_string(),
            sql_model: sql_model.to_string(),
            nlp_model: nlp_model.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to serialize execution record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write execution record: {0}")]
    Io(#[from] io::Error),
    #[error("failed to open record log in {path}: {reason}")]
    Init { path: String, reason: String },
}

/// Destination for finalized execution records, kept apart from progress output.
pub trait RecordSink: Send + Sync {
    fn write(&self, record: &ExecutionLog) -> Result<(), RecordError>;
}

/// Appends one JSON object per line to `records.<date>.jsonl`, rolling daily.
pub struct DailyRecordSink {
    dir: PathBuf,
    writer: Mutex<RollingFileAppender>,
}

impl DailyRecordSink {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, RecordError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("records")
            .filename_suffix("jsonl")
            .build(&dir)
            .map_err(|e| RecordError::Init {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            dir,
            writer: Mutex::new(appender),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordSink for DailyRecordSink {
    fn write(&self, record: &ExecutionLog) -> Result<(), RecordError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryRecordSink {
    records: Mutex<Vec<ExecutionLog>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ExecutionLog> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RecordSink for MemoryRecordSink {
    fn write(&self, record: &ExecutionLog) -> Result<(), RecordError> {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
        Ok(())
    }
}

/// An in-flight record that is stamped and written exactly once: by
/// [`RunRecord::finish`], or when dropped on any other exit path.
pub struct RunRecord {
    log: ExecutionLog,
    started: Instant,
    sink: Arc<dyn RecordSink>,
    finished: bool,
}

impl RunRecord {
    pub fn start(log: ExecutionLog, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            log,
            started: Instant::now(),
            sink,
            finished: false,
        }
    }

    pub fn log_mut(&mut self) -> &mut ExecutionLog {
        &mut self.log
    }

    pub fn finish(mut self) -> ExecutionLog {
        self.finalize();
        std::mem::take(&mut self.log)
    }

    fn finalize(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if !self.log.success && self.log.error.is_none() {
            let stage = self.log.current_stage();
            warn!("Run abandoned while {}", stage);
            self.log.failed_stage = Some(stage);
            self.log.error = Some(CANCELLED_ERROR.to_string());
            self.log.final_answer = Some(format!("Error: {}", CANCELLED_ERROR));
        }
        self.log.total_duration = self.started.elapsed().as_secs_f64();
        if let Err(e) = self.sink.write(&self.log) {
            error!("Failed to record execution log: {}", e);
        }
    }
}

impl Drop for RunRecord {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finish_writes_once_with_total_duration() {
        let sink = Arc::new(MemoryRecordSink::new());
        let mut record = RunRecord::start(ExecutionLog::new("q", "sql-m", "nlp-m"), sink.clone());
        record.log_mut().sql_generation_time = 0.0;
        std::thread::sleep(std::time::Duration::from_millis(5));

        let log = record.finish();
        assert!(log.total_duration >= 0.005);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], log);
    }

    #[test]
    fn test_drop_finalizes_an_abandoned_run() {
        let sink = Arc::new(MemoryRecordSink::new());
        {
            let mut record = RunRecord::start(ExecutionLog::new("q", "a", "b"), sink.clone());
            record.log_mut().sql_query = Some("SELECT 1".to_string());
        }

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sql_query.as_deref(), Some("SELECT 1"));
        assert!(!records[0].success);
        assert_eq!(records[0].error.as_deref(), Some(CANCELLED_ERROR));
        assert_eq!(records[0].failed_stage, Some(Stage::Executing));
        assert!(records[0].final_answer.as_deref().unwrap().starts_with("Error: "));
    }

    #[test]
    fn test_finish_keeps_recorded_outcome() {
        let sink = Arc::new(MemoryRecordSink::new());
        let mut record = RunRecord::start(ExecutionLog::new("q", "a", "b"), sink.clone());
        record.log_mut().success = true;
        record.log_mut().final_answer = Some("42".to_string());

        let log = record.finish();
        assert!(log.error.is_none());
        assert_eq!(log.failed_stage, None);
        assert_eq!(sink.records()[0].final_answer.as_deref(), Some("42"));
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn write(&self, _record: &ExecutionLog) -> Result<(), RecordError> {
            Err(RecordError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
        }
    }

    #[test]
    fn test_sink_failure_does_not_panic() {
        let record = RunRecord::start(ExecutionLog::new("q", "a", "b"), Arc::new(FailingSink));
        let log = record.finish();
        assert_eq!(log.user_prompt, "q");
    }

    #[test]
    fn test_daily_sink_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let sink = DailyRecordSink::new(dir.path().join("logs")).unwrap();

        let mut first = ExecutionLog::new("How many orders?", "sql-m", "nlp-m");
        first.success = true;
        first.final_answer = Some("830".to_string());
        sink.write(&first).unwrap();
        sink.write(&ExecutionLog::new("Second", "sql-m", "nlp-m")).unwrap();

        let files: Vec<PathBuf> = fs::read_dir(sink.dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("records."));
        assert!(name.ends_with(".jsonl"));

        let content = fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: ExecutionLog = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.user_prompt, "How many orders?");
        assert_eq!(parsed.final_answer.as_deref(), Some("830"));
        assert!(parsed.success);
    }
}
