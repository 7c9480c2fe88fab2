use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::pipeline::Pipeline;

/// Shared application state for the web server
pub struct AppState {
    /// One question at a time; the cache inside is not safe for concurrent writers
    pub pipeline: Mutex<Pipeline>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Mutex::new(pipeline),
            startup_time: Utc::now(),
        }
    }
}
