use cover_core::error::AppError;

/// Prompt in, text out. Implementations must not retry; the orchestrator decides what a
/// failure means.
pub trait Completer {
    fn complete(&self, prompt: &str, language: &str) -> Result<String, AppError>;
}

pub mod ollama_llm;

pub use ollama_llm::OllamaCompleter;
