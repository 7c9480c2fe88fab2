pub mod prompts;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A black-box text-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str, temperature: f32) -> Result<String, LlmError>;
}

/// Builds the provider named by `config.backend`.
pub fn build_backend(config: &LlmConfig) -> Result<Arc<dyn CompletionBackend>, LlmError> {
    let backend: Arc<dyn CompletionBackend> = match config.backend.as_str() {
        "ollama" => Arc::new(providers::ollama::OllamaProvider::new(config)?),
        "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
        _ => {
            return Err(LlmError::ConfigError(format!(
                "Unsupported LLM backend: {}",
                config.backend
            )));
        }
    };

    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend_is_a_config_error() {
        let config = LlmConfig {
            backend: "local".to_string(),
            ..LlmConfig::default()
        };
        match build_backend(&config) {
            Err(LlmError::ConfigError(msg)) => assert!(msg.contains("local")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_remote_requires_url_and_key() {
        let config = LlmConfig {
            backend: "remote".to_string(),
            api_url: Some("https://api.example.com/v1/chat/completions".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(build_backend(&config), Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_default_backend_is_ollama() {
        assert!(build_backend(&LlmConfig::default()).is_ok());
    }
}
