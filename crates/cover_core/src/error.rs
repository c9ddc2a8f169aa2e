use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across the decision engine, retrieval and the CLI.
///
/// The `code` prefix carries the error class (see [`ErrorKind`]); `stage` is attached by the
/// orchestrator so a caller can tell which step of a recommendation failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Configuration,
    Retrieval,
    Explanation,
    Ingest,
    Internal,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
            stage: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Keeps the innermost stage when an error crosses several layers.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage.into());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        let code = self.code.as_str();
        if code.starts_with("VALIDATION_") {
            ErrorKind::Validation
        } else if code.starts_with("CONFIG_") {
            ErrorKind::Configuration
        } else if code.starts_with("RETRIEVAL_") {
            ErrorKind::Retrieval
        } else if code.starts_with("EXPLANATION_") {
            ErrorKind::Explanation
        } else if code.starts_with("INGEST_") {
            ErrorKind::Ingest
        } else {
            ErrorKind::Internal
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stage {
            Some(stage) => write!(f, "[{}] ({stage}) {}", self.code, self.message)?,
            None => write!(f, "[{}] {}", self.code, self.message)?,
        }
        if let Some(details) = &self.details {
            write!(f, ": {details}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
