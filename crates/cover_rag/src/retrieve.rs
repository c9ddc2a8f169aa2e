use std::collections::HashSet;

use cover_core::error::AppError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::entities::{extract_entities, QUERY_ENTITY_LIMIT};
use crate::graph::{Fact, KnowledgeGraph};
use crate::vector::VectorSearch;

const CONTEXT_KEY_CHARS: usize = 512;

pub const DEFAULT_K_VECTOR: usize = 6;
pub const DEFAULT_K_GRAPH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidencePack {
    pub query: String,
    pub extracted_entities: Vec<String>,
    pub facts: Vec<Fact>,
    pub contexts: Vec<String>,
    pub sources: Vec<String>,
}

/// Vector similarity plus graph neighbourhood, merged into one deduplicated pack.
pub struct HybridRetriever {
    vectors: Box<dyn VectorSearch>,
    graph: Box<dyn KnowledgeGraph>,
}

impl HybridRetriever {
    pub fn new(vectors: Box<dyn VectorSearch>, graph: Box<dyn KnowledgeGraph>) -> Self {
        Self { vectors, graph }
    }

    pub fn retrieve(
        &self,
        query: &str,
        k_vector: usize,
        k_graph: usize,
    ) -> Result<EvidencePack, AppError> {
        let hits = self
            .vectors
            .similarity_search(query, k_vector)
            .map_err(|e| as_retrieval_error(e, "RETRIEVAL_VECTOR_FAILED"))?;
        let entities = extract_entities(query, QUERY_ENTITY_LIMIT);

        let mut facts = Vec::new();
        let mut graph_contexts = Vec::new();
        for entity in &entities {
            facts.extend(
                self.graph
                    .related_facts(entity, k_graph)
                    .map_err(|e| as_retrieval_error(e, "RETRIEVAL_GRAPH_FAILED"))?,
            );
            graph_contexts.extend(
                self.graph
                    .mentioning_previews(entity, k_graph)
                    .map_err(|e| as_retrieval_error(e, "RETRIEVAL_GRAPH_FAILED"))?,
            );
        }

        let cap = k_vector + k_graph;
        let mut contexts = Vec::new();
        let mut seen = HashSet::new();
        let candidates = hits
            .iter()
            .map(|h| h.content.as_str())
            .chain(graph_contexts.iter().map(String::as_str));
        for text in candidates {
            if contexts.len() >= cap {
                break;
            }
            if seen.insert(context_key(text)) {
                contexts.push(text.trim().to_string());
            }
        }

        let pack = EvidencePack {
            query: query.to_string(),
            extracted_entities: entities,
            facts: dedupe(facts),
            contexts,
            sources: dedupe(hits.into_iter().map(|h| h.source).collect()),
        };
        debug!(
            entities = pack.extracted_entities.len(),
            facts = pack.facts.len(),
            contexts = pack.contexts.len(),
            sources = pack.sources.len(),
            "hybrid retrieval"
        );
        Ok(pack)
    }
}

/// Hash of the first 512 characters; two contexts with the same prefix are one context.
fn context_key(text: &str) -> String {
    let prefix: String = text.chars().take(CONTEXT_KEY_CHARS).collect();
    hex::encode(Sha256::digest(prefix.as_bytes()))
}

/// Order-preserving.
fn dedupe<T: Clone + Eq + std::hash::Hash>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Backend failures keep their own code when it is already a retrieval error.
fn as_retrieval_error(e: AppError, fallback_code: &str) -> AppError {
    if e.code.starts_with("RETRIEVAL_") {
        return e;
    }
    let details = format!("cause={}; {}", e.code, e.details.clone().unwrap_or_default());
    AppError::new(fallback_code, e.message)
        .with_details(details)
        .with_retryable(e.retryable)
}
