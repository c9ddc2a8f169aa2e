use std::path::PathBuf;

use cover_rag::corpus::load_text_dir;
use cover_rag::graph::{
    chunk_id, ingest_chunks, ChunkRecord, GraphStore, IngestOptions, KnowledgeGraph, LABEL_CHUNK,
    LABEL_ENTITY, REL_CO_OCCURS, REL_HAS_CHUNK, REL_MENTIONS,
};
use pretty_assertions::assert_eq;

fn corpus_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/corpus"))
}

fn numbered_chunks(n: usize) -> Vec<ChunkRecord> {
    (0..n)
        .map(|i| ChunkRecord {
            source: "numbers.txt".to_string(),
            content: format!("Clause {i}: flood cover applies after the waiting period."),
        })
        .collect()
}

#[test]
fn reingesting_the_same_corpus_is_idempotent() {
    let chunks = load_text_dir(&corpus_dir()).expect("load corpus");
    assert!(chunks.len() >= 4);

    let mut store = GraphStore::open_in_memory().expect("open");
    let first = ingest_chunks(&mut store, chunks.clone(), &IngestOptions::default()).expect("ingest");
    assert_eq!(first.processed_count, chunks.len());
    let counts_once = store.counts().expect("counts");

    ingest_chunks(&mut store, chunks.clone(), &IngestOptions::default()).expect("re-ingest");
    let counts_twice = store.counts().expect("counts");

    assert_eq!(counts_once, counts_twice);
    assert_eq!(counts_once.nodes.get(LABEL_CHUNK).copied(), Some(chunks.len() as u64));
    assert_eq!(counts_once.nodes.get("Source").copied(), Some(4));
    assert_eq!(counts_once.edges.get(REL_HAS_CHUNK).copied(), Some(chunks.len() as u64));
}

#[test]
fn chunk_preview_is_set_on_first_write_only() {
    let head = "A".repeat(600);
    let original = ChunkRecord {
        source: "doc.txt".to_string(),
        content: format!("{head} original tail"),
    };
    let revised = ChunkRecord {
        source: "doc.txt".to_string(),
        content: format!("{head} revised tail"),
    };
    let id = chunk_id(&original.source, &original.content);
    assert_eq!(id, chunk_id(&revised.source, &revised.content));

    let mut store = GraphStore::open_in_memory().expect("open");
    ingest_chunks(&mut store, vec![original], &IngestOptions::default()).expect("ingest");
    ingest_chunks(&mut store, vec![revised], &IngestOptions::default()).expect("re-ingest");

    let props = store.node_props(LABEL_CHUNK, &id).expect("props").expect("chunk exists");
    let preview = props["preview"].as_str().unwrap_or_default();
    assert!(preview.ends_with("original tail"));
    assert_eq!(store.counts().expect("counts").nodes.get(LABEL_CHUNK).copied(), Some(1));
}

#[test]
fn co_occurrence_links_every_entity_pair_once() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let chunk = ChunkRecord {
        source: "property.txt".to_string(),
        content: "Flood and fire damage to a villa is covered.".to_string(),
    };
    ingest_chunks(&mut store, vec![chunk.clone(), chunk], &IngestOptions::default()).expect("ingest");

    let counts = store.counts().expect("counts");
    let entities = counts.nodes.get(LABEL_ENTITY).copied().unwrap_or_default();
    assert!(entities >= 3);
    assert_eq!(counts.edges.get(REL_MENTIONS).copied(), Some(entities));
    assert_eq!(
        counts.edges.get(REL_CO_OCCURS).copied(),
        Some(entities * (entities - 1) / 2)
    );

    let facts = store.related_facts("fire", 50).expect("facts");
    assert!(facts.iter().all(|f| f.subject == "fire"));
    assert!(facts.iter().any(|f| f.relation == REL_CO_OCCURS && f.object == "villa"));

    let previews = store.mentioning_previews("villa", 5).expect("previews");
    assert_eq!(previews, vec!["Flood and fire damage to a villa is covered."]);
    assert!(store.related_facts("unknown entity", 5).expect("facts").is_empty());
}

#[test]
fn limit_stops_after_the_batch_that_reaches_it() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let opts = IngestOptions {
        batch_size: 2,
        limit: Some(3),
        ..IngestOptions::default()
    };
    let summary = ingest_chunks(&mut store, numbered_chunks(7), &opts).expect("ingest");
    assert_eq!(summary.processed_count, 4);
    assert_eq!(summary.batches, 2);
}

#[test]
fn named_job_resumes_from_its_checkpoint() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let first = IngestOptions {
        batch_size: 2,
        limit: Some(2),
        job: Some("corpus".to_string()),
        resume: false,
    };
    let summary = ingest_chunks(&mut store, numbered_chunks(5), &first).expect("first run");
    assert_eq!(summary.processed_count, 2);
    assert_eq!(store.checkpoint("corpus").expect("checkpoint"), Some(2));

    let resume = IngestOptions {
        batch_size: 2,
        limit: None,
        job: Some("corpus".to_string()),
        resume: true,
    };
    let summary = ingest_chunks(&mut store, numbered_chunks(5), &resume).expect("resume");
    assert_eq!(summary.resumed_from, 2);
    assert_eq!(summary.processed_count, 3);
    assert_eq!(summary.batches, 2);
    assert_eq!(store.checkpoint("corpus").expect("checkpoint"), Some(5));
    assert_eq!(store.counts().expect("counts").nodes.get(LABEL_CHUNK).copied(), Some(5));

    // Without `resume` the job starts over.
    let restart = IngestOptions {
        resume: false,
        ..resume
    };
    let summary = ingest_chunks(&mut store, numbered_chunks(5), &restart).expect("restart");
    assert_eq!(summary.resumed_from, 0);
    assert_eq!(summary.processed_count, 5);
    assert_eq!(store.checkpoint("unknown").expect("checkpoint"), None);
}

#[test]
fn resume_matches_committed_chunks_by_id_not_position() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let first = IngestOptions {
        batch_size: 2,
        limit: Some(2),
        job: Some("corpus".to_string()),
        resume: false,
    };
    ingest_chunks(&mut store, numbered_chunks(5), &first).expect("first run");

    // The index was rebuilt in between: a new chunk sorts first and the rest reversed.
    let mut rebuilt = vec![ChunkRecord {
        source: "added.txt".to_string(),
        content: "Theft of baggage is covered up to the declared limit.".to_string(),
    }];
    rebuilt.extend(numbered_chunks(5).into_iter().rev());

    let resume = IngestOptions {
        limit: None,
        resume: true,
        ..first
    };
    let summary = ingest_chunks(&mut store, rebuilt, &resume).expect("resume");
    assert_eq!(summary.resumed_from, 2);
    assert_eq!(summary.processed_count, 4);
    assert_eq!(store.checkpoint("corpus").expect("checkpoint"), Some(6));
    assert_eq!(store.counts().expect("counts").nodes.get(LABEL_CHUNK).copied(), Some(6));
}

#[test]
fn on_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("graph.sqlite");
    let mut store = GraphStore::open(&path).expect("open");
    ingest_chunks(&mut store, numbered_chunks(3), &IngestOptions::default()).expect("ingest");
    store.close().expect("close");

    let store = GraphStore::open(&path).expect("reopen");
    store.ping().expect("ping");
    assert_eq!(store.counts().expect("counts").nodes.get(LABEL_CHUNK).copied(), Some(3));
}
