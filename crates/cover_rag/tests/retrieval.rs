use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use cover_core::error::{AppError, ErrorKind};
use cover_rag::graph::{ingest_chunks, ChunkRecord, Fact, GraphStore, IngestOptions, KnowledgeGraph};
use cover_rag::retrieve::HybridRetriever;
use cover_rag::vector::{VectorHit, VectorSearch};
use pretty_assertions::assert_eq;

struct StubVectors {
    hits: Vec<VectorHit>,
}

impl VectorSearch for StubVectors {
    fn similarity_search(&self, _query: &str, k: usize) -> Result<Vec<VectorHit>, AppError> {
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

struct OfflineVectors;

impl VectorSearch for OfflineVectors {
    fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<VectorHit>, AppError> {
        Err(AppError::new("CONFIG_OLLAMA_UNREACHABLE", "connection refused").with_retryable(true))
    }
}

#[derive(Default)]
struct StubGraph {
    facts: HashMap<String, Vec<Fact>>,
    previews: HashMap<String, Vec<String>>,
    calls: Rc<Cell<usize>>,
}

impl KnowledgeGraph for StubGraph {
    fn related_facts(&self, entity: &str, limit: usize) -> Result<Vec<Fact>, AppError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self
            .facts
            .get(entity)
            .map(|f| f.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn mentioning_previews(&self, entity: &str, limit: usize) -> Result<Vec<String>, AppError> {
        Ok(self
            .previews
            .get(entity)
            .map(|p| p.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

struct BrokenGraph;

impl KnowledgeGraph for BrokenGraph {
    fn related_facts(&self, _entity: &str, _limit: usize) -> Result<Vec<Fact>, AppError> {
        Err(AppError::new("RETRIEVAL_GRAPH_QUERY_FAILED", "database is locked").with_retryable(true))
    }

    fn mentioning_previews(&self, _entity: &str, _limit: usize) -> Result<Vec<String>, AppError> {
        Ok(Vec::new())
    }
}

fn hit(source: &str, content: &str) -> VectorHit {
    VectorHit {
        content: content.to_string(),
        source: source.to_string(),
    }
}

#[test]
fn no_entities_still_returns_vector_contexts() {
    let calls = Rc::new(Cell::new(0));
    let graph = StubGraph {
        calls: calls.clone(),
        ..Default::default()
    };
    let retriever = HybridRetriever::new(
        Box::new(StubVectors {
            hits: vec![hit("a.txt", "  what the policy covers  "), hit("b.txt", "claims process")],
        }),
        Box::new(graph),
    );

    let pack = retriever.retrieve("what is covered here?", 6, 6).expect("retrieve");
    assert!(pack.extracted_entities.is_empty());
    assert!(pack.facts.is_empty());
    assert_eq!(pack.contexts, vec!["what the policy covers", "claims process"]);
    assert_eq!(pack.sources, vec!["a.txt", "b.txt"]);
    assert_eq!(calls.get(), 0);
}

#[test]
fn contexts_with_the_same_512_char_prefix_collapse() {
    let prefix = "x".repeat(512);
    let retriever = HybridRetriever::new(
        Box::new(StubVectors {
            hits: vec![
                hit("a.txt", &format!("{prefix} first tail")),
                hit("a.txt", &format!("{prefix} second tail")),
                hit("b.txt", "different"),
            ],
        }),
        Box::new(StubGraph::default()),
    );

    let pack = retriever.retrieve("policy", 6, 6).expect("retrieve");
    assert_eq!(pack.contexts.len(), 2);
    assert!(pack.contexts[0].ends_with("first tail"));
    assert_eq!(pack.contexts[1], "different");
    assert_eq!(pack.sources, vec!["a.txt", "b.txt"]);
}

#[test]
fn graph_contexts_follow_vector_contexts_up_to_the_cap() {
    let mut graph = StubGraph::default();
    graph.facts.insert(
        "flood".to_string(),
        vec![
            Fact::new("flood", "CO_OCCURS", "fire"),
            Fact::new("flood", "MENTIONS", "Chunk"),
        ],
    );
    graph.facts.insert(
        "Flood".to_string(),
        vec![Fact::new("flood", "CO_OCCURS", "fire")],
    );
    graph.previews.insert(
        "flood".to_string(),
        vec![
            "vector text".to_string(),
            "graph one".to_string(),
            "graph two".to_string(),
        ],
    );

    let retriever = HybridRetriever::new(
        Box::new(StubVectors {
            hits: vec![hit("v.txt", "vector text")],
        }),
        Box::new(graph),
    );

    let pack = retriever.retrieve("Flood cover", 1, 1).expect("retrieve");
    assert_eq!(pack.extracted_entities, vec!["flood", "Flood"]);
    // Previews are capped per entity by k_graph, contexts overall by k_vector + k_graph.
    assert_eq!(pack.contexts, vec!["vector text"]);
    assert_eq!(pack.facts, vec![Fact::new("flood", "CO_OCCURS", "fire")]);

    let pack = retriever.retrieve("Flood cover", 1, 3).expect("retrieve");
    assert_eq!(pack.contexts, vec!["vector text", "graph one", "graph two"]);
    assert_eq!(
        pack.facts,
        vec![
            Fact::new("flood", "CO_OCCURS", "fire"),
            Fact::new("flood", "MENTIONS", "Chunk"),
        ]
    );
}

#[test]
fn graph_failure_is_an_error_not_an_empty_pack() {
    let retriever = HybridRetriever::new(
        Box::new(StubVectors {
            hits: vec![hit("a.txt", "flood cover")],
        }),
        Box::new(BrokenGraph),
    );
    let err = retriever.retrieve("flood damage", 6, 6).unwrap_err();
    assert_eq!(err.code, "RETRIEVAL_GRAPH_QUERY_FAILED");
    assert_eq!(err.kind(), ErrorKind::Retrieval);
}

#[test]
fn vector_backend_failure_becomes_a_retrieval_error() {
    let retriever = HybridRetriever::new(Box::new(OfflineVectors), Box::new(StubGraph::default()));
    let err = retriever.retrieve("flood damage", 6, 6).unwrap_err();
    assert_eq!(err.code, "RETRIEVAL_VECTOR_FAILED");
    assert!(err.retryable);
    assert!(err.details.unwrap_or_default().contains("CONFIG_OLLAMA_UNREACHABLE"));
}

#[test]
fn sqlite_graph_answers_hybrid_queries() {
    let mut store = GraphStore::open_in_memory().expect("open");
    ingest_chunks(
        &mut store,
        vec![ChunkRecord {
            source: "property.txt".to_string(),
            content: "Flood and fire damage to a villa is covered.".to_string(),
        }],
        &IngestOptions::default(),
    )
    .expect("ingest");

    let retriever = HybridRetriever::new(Box::new(StubVectors { hits: Vec::new() }), Box::new(store));
    let pack = retriever.retrieve("villa flood", 0, 10).expect("retrieve");
    assert_eq!(pack.contexts, vec!["Flood and fire damage to a villa is covered."]);
    assert!(pack.facts.contains(&Fact::new("villa", "MENTIONS", "Chunk")));
    assert!(pack.facts.contains(&Fact::new("flood", "CO_OCCURS", "villa")));
    assert!(pack.sources.is_empty());
}
