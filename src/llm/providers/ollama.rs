use crate::config::LlmConfig;
use crate::llm::{CompletionBackend, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::http_client;

const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            client: http_client(config.request_timeout_secs)?,
            api_url,
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaProvider {
    async fn complete(&self, prompt: &str, model: &str, temperature: f32) -> Result<String, LlmError> {
        debug!("Sending request to Ollama at {} with model: {}", self.api_url, model);

        let request = OllamaRequest {
            model,
            prompt,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        let ollama_response = parse_response(&response_text)?;
        if ollama_response.done == Some(false) {
            debug!("Ollama reported an unfinished generation for model {}", model);
        }

        Ok(ollama_response.response)
    }
}

fn parse_response(body: &str) -> Result<OllamaResponse, LlmError> {
    serde_json::from_str::<OllamaResponse>(body).map_err(|e| {
        error!("Failed to parse Ollama response: {} - Response was: {}", e, body);
        LlmError::ResponseError(format!(
            "Failed to parse Ollama response: {} - Response was: {}",
            e, body
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_temperature_in_options() {
        let request = OllamaRequest {
            model: "smollm2:latest",
            prompt: "hello",
            stream: false,
            options: OllamaOptions { temperature: 0.3 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "smollm2:latest");
        assert_eq!(json["stream"], false);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_response_ignores_extra_fields() {
        let body = r#"{"model":"m","created_at":"2024-01-01T00:00:00Z","response":"SELECT 1","done":true,"total_duration":12}"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.response, "SELECT 1");
        assert_eq!(parsed.done, Some(true));
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(matches!(parse_response("not json"), Err(LlmError::ResponseError(_))));
    }

    #[test]
    fn test_default_api_url() {
        let provider = OllamaProvider::new(&LlmConfig::default()).unwrap();
        assert_eq!(provider.api_url, DEFAULT_API_URL);
    }
}
