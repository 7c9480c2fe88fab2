pub mod ollama;
pub mod remote;

use std::time::Duration;

use crate::llm::LlmError;

pub(crate) fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client, LlmError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| LlmError::ConnectionError(e.to_string()))
}
