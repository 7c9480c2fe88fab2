use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::cache::CacheEntry;
use super::record::ExecutionLog;

/// Placeholder reported when no SQL was produced.
pub const NO_SQL_MARKER: &str = "Failed";

/// What a caller gets back for one question, whether answered or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub sql_query: String,
    /// Seconds; zero for cached answers
    pub execution_time: f64,
    pub from_cache: bool,
}

impl QueryResponse {
    pub fn from_cache(question: &str, entry: &CacheEntry) -> Self {
        Self {
            question: question.to_string(),
            answer: entry.answer.clone(),
            sql_query: entry.sql_query.clone(),
            execution_time: 0.0,
            from_cache: true,
        }
    }

    pub fn from_log(log: &ExecutionLog) -> Self {
        Self {
            question: log.user_prompt.clone(),
            answer: log.final_answer.clone().unwrap_or_default(),
            sql_query: log
                .sql_query
                .clone()
                .unwrap_or_else(|| NO_SQL_MARKER.to_string()),
            execution_time: log.total_duration,
            from_cache: false,
        }
    }

    /// Multi-line banner for terminal output.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "QUESTION : {}", self.question);
        let _ = writeln!(out, "SQL QUERY: {}", self.sql_query);
        let _ = writeln!(out, "ANSWER   : {}", self.answer);
        if self.from_cache {
            let _ = writeln!(out, "TIME     : 0.00s (Cached)");
        } else {
            let _ = writeln!(out, "TIME     : {:.2}s", self.execution_time);
        }
        out.push_str(&rule);
        out
    }
}
