use std::time::Duration;

use cover_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Completer;
use crate::ollama::OllamaClient;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct OllamaCompleter {
    client: OllamaClient,
    model: String,
}

impl OllamaCompleter {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: String,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Completer for OllamaCompleter {
    fn complete(&self, prompt: &str, language: &str) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let req = GenerateRequest {
            model: &self.model,
            system: format!(
                "You are a helpful insurance assistant. Answer in {language}. Be concise and precise."
            ),
            prompt,
            stream: false,
        };

        let resp = ureq::post(&url)
            .timeout(COMPLETION_TIMEOUT)
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new("EXPLANATION_REQUEST_FAILED", "Failed to encode completion request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new(
                        "EXPLANATION_RESPONSE_INVALID",
                        "Failed to decode completion response",
                    )
                    .with_details(e.to_string())
                })?;
                if v.response.trim().is_empty() {
                    return Err(AppError::new(
                        "EXPLANATION_RESPONSE_INVALID",
                        "Completion response was empty",
                    ));
                }
                Ok(v.response.trim().to_string())
            }
            Ok(r) => Err(
                AppError::new("EXPLANATION_REQUEST_FAILED", "Completion request failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(
                AppError::new("EXPLANATION_REQUEST_FAILED", "Failed to call completion endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}
