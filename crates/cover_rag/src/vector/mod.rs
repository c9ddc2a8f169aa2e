use cover_core::error::AppError;
use serde::{Deserialize, Serialize};

pub mod index;
mod similarity;

pub use index::{EmbeddingSearch, IndexBuildInput, IndexStatus, VectorIndex};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorHit {
    pub content: String,
    pub source: String,
}

/// Vector side of hybrid retrieval: up to `k` hits, most similar first.
pub trait VectorSearch {
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<VectorHit>, AppError>;
}
