use std::fs;

use cover_rag::graph::{
    ingest_policy_records, GraphStore, IngestOptions, KnowledgeGraph, LABEL_COUNTRY,
    LABEL_DISEASE, LABEL_HOUSE, LABEL_POLICY, LABEL_TRIP, LABEL_USER, LABEL_VEHICLE,
    REL_APPLICABLE_IN, REL_COVERS, REL_DESTINATION, REL_HAS_TRIP, REL_HOLDS,
};
use pretty_assertions::assert_eq;

fn sample_csv() -> String {
    fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/policies/sample_policies.csv"
    ))
    .expect("read fixture")
}

#[test]
fn policy_rows_become_linked_nodes() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let summary = ingest_policy_records(&mut store, &sample_csv(), "india", &IngestOptions::default())
        .expect("ingest");
    assert_eq!(summary.processed_count, 7);

    let counts = store.counts().expect("counts");
    let node = |label: &str| counts.nodes.get(label).copied().unwrap_or_default();
    let edge = |rel: &str| counts.edges.get(rel).copied().unwrap_or_default();

    assert_eq!(node(LABEL_POLICY), 7);
    assert_eq!(node(LABEL_USER), 7);
    assert_eq!(node(LABEL_COUNTRY), 2);
    assert_eq!(node(LABEL_DISEASE), 3);
    assert_eq!(node(LABEL_VEHICLE), 2);
    assert_eq!(node(LABEL_HOUSE), 1);
    assert_eq!(node(LABEL_TRIP), 1);

    assert_eq!(edge(REL_HOLDS), 7);
    assert_eq!(edge(REL_APPLICABLE_IN), 7);
    assert_eq!(edge(REL_COVERS), 6);
    assert_eq!(edge(REL_HAS_TRIP), 1);
    assert_eq!(edge(REL_DESTINATION), 1);

    let props = store.node_props(LABEL_POLICY, "india_0").expect("props").expect("policy");
    assert_eq!(props["policy_tier"], "Standard");
    assert_eq!(props["policytype"], "Health");
}

#[test]
fn reingesting_records_updates_in_place() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let csv = sample_csv();
    ingest_policy_records(&mut store, &csv, "india", &IngestOptions::default()).expect("ingest");
    let before = store.counts().expect("counts");

    let upgraded = csv.replacen("Asha Rao,34,Health,Standard", "Asha Rao,34,Health,Gold", 1);
    ingest_policy_records(&mut store, &upgraded, "india", &IngestOptions::default())
        .expect("re-ingest");

    assert_eq!(store.counts().expect("counts"), before);
    let props = store.node_props(LABEL_POLICY, "india_0").expect("props").expect("policy");
    assert_eq!(props["policy_tier"], "Gold");
}

#[test]
fn record_nodes_are_not_entities() {
    let mut store = GraphStore::open_in_memory().expect("open");
    ingest_policy_records(&mut store, &sample_csv(), "india", &IngestOptions::default())
        .expect("ingest");

    // Fact lookups go through Entity nodes only.
    assert!(store.related_facts("Diabetes", 5).expect("facts").is_empty());
    let user = store.node_props(LABEL_USER, "Vikram Shah").expect("props").expect("user");
    assert_eq!(user["smokerdrinker"], "Yes");
}

#[test]
fn empty_csv_ingests_nothing() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let summary = ingest_policy_records(&mut store, "", "india", &IngestOptions::default())
        .expect("empty input");
    assert_eq!(summary.processed_count, 0);
}

#[test]
fn malformed_row_is_counted_and_the_rest_still_ingest() {
    let csv = sample_csv();
    let mut lines: Vec<&str> = csv.lines().collect();
    lines.insert(2, "India,Broken Row,41,Health");
    let damaged = lines.join("\n");

    let mut store = GraphStore::open_in_memory().expect("open");
    let summary = ingest_policy_records(&mut store, &damaged, "india", &IngestOptions::default())
        .expect("ingest");

    assert_eq!(summary.processed_count, 7);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.warnings[0].code, "INGEST_POLICY_CSV_PARSE_FAILED");
    assert_eq!(
        store.counts().expect("counts").nodes.get(LABEL_POLICY).copied(),
        Some(7)
    );
    assert!(store.node_props(LABEL_USER, "Broken Row").expect("props").is_none());
}

#[test]
fn clean_file_reports_no_skips() {
    let mut store = GraphStore::open_in_memory().expect("open");
    let summary = ingest_policy_records(&mut store, &sample_csv(), "india", &IngestOptions::default())
        .expect("ingest");
    assert_eq!(summary.skipped, 0);
    assert!(summary.warnings.is_empty());
}
