use std::time::Duration;

use cover_core::error::AppError;

const HEALTH_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    /// Create a client for an Ollama server given as `scheme://host[:port]`.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url).timeout(HEALTH_TIMEOUT).call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("CONFIG_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(AppError::new("CONFIG_OLLAMA_UNREACHABLE", "Failed to reach Ollama")
                .with_details(format!("base_url={}; err={}", self.base_url, e))
                .with_retryable(true)),
        }
    }
}

fn validate_base_url(base_url: &str) -> Result<(), AppError> {
    let invalid = |reason: &str| {
        AppError::new("CONFIG_OLLAMA_URL_INVALID", "Ollama base URL must be scheme://host[:port]")
            .with_details(format!("base_url={base_url}; reason={reason}"))
    };

    let authority = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .ok_or_else(|| invalid("scheme must be http or https"))?;

    if authority.contains(|c: char| matches!(c, '/' | '@' | '?' | '#' | '[' | ']')) {
        return Err(invalid("only a host and optional port are allowed"));
    }

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p != 0 => {}
            _ => return Err(invalid("port must be 1-65535")),
        }
    }
    Ok(())
}
