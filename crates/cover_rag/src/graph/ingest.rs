use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use cover_core::domain::ValidationWarning;
use cover_core::error::AppError;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use super::store::{link, record_committed_keys, upsert_node, GraphStore, OnMatch};
use super::{LABEL_CHUNK, LABEL_ENTITY, LABEL_SOURCE, REL_CO_OCCURS, REL_HAS_CHUNK, REL_MENTIONS};
use crate::entities::{extract_entities, CHUNK_ENTITY_LIMIT};

const CHUNK_ID_PREFIX_CHARS: usize = 512;
const PREVIEW_CHARS: usize = 1200;
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// One document chunk as it comes out of the vector index or the corpus loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub source: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreparedChunk {
    pub source: String,
    pub id: String,
    pub preview: String,
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// Stop after the first flushed batch that reaches this many records.
    pub limit: Option<usize>,
    /// Named jobs record a checkpoint after every committed batch.
    pub job: Option<String>,
    /// Skip the records an earlier run of `job` already committed, matched by record key
    /// rather than position, so a reordered or grown input resumes correctly.
    pub resume: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            limit: None,
            job: None,
            resume: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestSummary {
    pub processed_count: usize,
    /// Records skipped because a checkpoint already covered them.
    pub resumed_from: usize,
    /// Input records that could not be read and were left out.
    pub skipped: usize,
    pub warnings: Vec<ValidationWarning>,
    pub batches: usize,
    pub elapsed_ms: u64,
    pub chunks_per_sec: f64,
}

/// Content-addressed: hex SHA-256 of `"{source}::{first 512 chars}"`.
pub fn chunk_id(source: &str, content: &str) -> String {
    let prefix: String = content.chars().take(CHUNK_ID_PREFIX_CHARS).collect();
    let digest = Sha256::digest(format!("{source}::{prefix}").as_bytes());
    hex::encode(digest)
}

/// `None` for chunks with no content.
pub fn prepare_chunk(record: &ChunkRecord) -> Option<PreparedChunk> {
    if record.content.trim().is_empty() {
        return None;
    }
    let preview: String = record.content.chars().take(PREVIEW_CHARS).collect();
    let entities = extract_entities(&preview, CHUNK_ENTITY_LIMIT);
    Some(PreparedChunk {
        source: record.source.clone(),
        id: chunk_id(&record.source, &record.content),
        preview,
        entities,
    })
}

pub fn ingest_chunks<I>(
    store: &mut GraphStore,
    records: I,
    opts: &IngestOptions,
) -> Result<IngestSummary, AppError>
where
    I: IntoIterator<Item = ChunkRecord>,
{
    let prepared: Vec<PreparedChunk> = records
        .into_iter()
        .filter_map(|r| prepare_chunk(&r))
        .collect();
    run_batches(store, prepared, opts, "chunks", chunk_key, write_chunk_batch)
}

fn chunk_key(chunk: &PreparedChunk) -> &str {
    &chunk.id
}

fn write_chunk_batch(conn: &Connection, batch: &[PreparedChunk]) -> Result<(), AppError> {
    let empty = serde_json::json!({});
    for chunk in batch {
        let source_id = upsert_node(
            conn,
            LABEL_SOURCE,
            &chunk.source,
            Some(chunk.source.as_str()),
            &empty,
            OnMatch::Keep,
        )?;
        // Preview is set on create only.
        let chunk_node = upsert_node(
            conn,
            LABEL_CHUNK,
            &chunk.id,
            None,
            &serde_json::json!({ "preview": chunk.preview }),
            OnMatch::Keep,
        )?;
        link(conn, source_id, REL_HAS_CHUNK, chunk_node)?;

        let mut entity_ids: BTreeMap<&str, i64> = BTreeMap::new();
        for name in &chunk.entities {
            let id = upsert_node(conn, LABEL_ENTITY, name, Some(name.as_str()), &empty, OnMatch::Keep)?;
            link(conn, chunk_node, REL_MENTIONS, id)?;
            entity_ids.insert(name.as_str(), id);
        }

        // BTreeMap iteration is ordered, so each pair is visited once as (a, b) with a < b.
        let ordered: Vec<(&str, i64)> = entity_ids.into_iter().collect();
        for (i, (_, a)) in ordered.iter().enumerate() {
            for (_, b) in ordered.iter().skip(i + 1) {
                link(conn, *a, REL_CO_OCCURS, *b)?;
            }
        }
    }
    Ok(())
}

/// Shared batch driver: one transaction per batch, checkpoint after each commit, limit
/// checked after each flush. `key` names a record for checkpointing; its committed keys are
/// written in the same transaction as the batch.
pub(crate) fn run_batches<T, K, W>(
    store: &mut GraphStore,
    items: Vec<T>,
    opts: &IngestOptions,
    what: &str,
    key: K,
    write: W,
) -> Result<IngestSummary, AppError>
where
    K: Fn(&T) -> &str,
    W: Fn(&Connection, &[T]) -> Result<(), AppError>,
{
    let batch_size = opts.batch_size.max(1);
    let committed = match (&opts.job, opts.resume) {
        (Some(job), true) => store.committed_keys(job)?,
        (Some(job), false) => {
            store.reset_checkpoint(job)?;
            HashSet::new()
        }
        (None, _) => HashSet::new(),
    };
    let total = items.len();
    let pending: Vec<T> = items
        .into_iter()
        .filter(|item| !committed.contains(key(item)))
        .collect();
    let resumed_from = total - pending.len();

    info!(what, batch_size, limit = ?opts.limit, resumed_from, "starting graph ingestion");
    let mut progress = Progress {
        what,
        job: opts.job.as_deref(),
        committed_before: committed.len(),
        processed: 0,
        batches: 0,
        started: Instant::now(),
    };
    let limit_reached = |p: &Progress<'_>| opts.limit.is_some_and(|limit| p.processed >= limit);

    let mut batch: Vec<T> = Vec::with_capacity(batch_size);
    for item in pending {
        batch.push(item);
        if batch.len() >= batch_size {
            progress.commit(store, &mut batch, &key, &write)?;
            if limit_reached(&progress) {
                break;
            }
        }
    }
    if !batch.is_empty() && !limit_reached(&progress) {
        progress.commit(store, &mut batch, &key, &write)?;
    }

    let elapsed = progress.started.elapsed();
    let summary = IngestSummary {
        processed_count: progress.processed,
        resumed_from,
        skipped: 0,
        warnings: Vec::new(),
        batches: progress.batches,
        elapsed_ms: elapsed.as_millis().min(u64::MAX as u128) as u64,
        chunks_per_sec: rate(progress.processed, elapsed.as_secs_f64()),
    };
    info!(
        what,
        processed = summary.processed_count,
        batches = summary.batches,
        elapsed_ms = summary.elapsed_ms,
        "graph ingestion finished"
    );
    Ok(summary)
}

struct Progress<'a> {
    what: &'a str,
    job: Option<&'a str>,
    committed_before: usize,
    processed: usize,
    batches: usize,
    started: Instant,
}

impl Progress<'_> {
    fn commit<T, K, W>(
        &mut self,
        store: &mut GraphStore,
        batch: &mut Vec<T>,
        key: &K,
        write: &W,
    ) -> Result<(), AppError>
    where
        K: Fn(&T) -> &str,
        W: Fn(&Connection, &[T]) -> Result<(), AppError>,
    {
        let job = self.job;
        store
            .write_batch(|conn| {
                write(conn, batch.as_slice())?;
                if let Some(job) = job {
                    record_committed_keys(conn, job, batch.iter().map(|item| key(item)))?;
                }
                Ok(())
            })
            .map_err(|e| {
                let details = format!(
                    "batch={}; committed_before={}; {}",
                    self.batches + 1,
                    self.committed_before + self.processed,
                    e.details.clone().unwrap_or_default()
                );
                e.with_details(details)
            })?;
        self.processed += batch.len();
        self.batches += 1;
        batch.clear();
        if let Some(job) = self.job {
            store.save_checkpoint(job, self.committed_before + self.processed)?;
        }

        let elapsed = self.started.elapsed();
        info!(
            what = self.what,
            processed = self.processed,
            elapsed_ms = elapsed.as_millis() as u64,
            per_sec = rate(self.processed, elapsed.as_secs_f64()),
            "batch committed"
        );
        Ok(())
    }
}

fn rate(processed: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        processed as f64 / elapsed_secs
    } else {
        0.0
    }
}
