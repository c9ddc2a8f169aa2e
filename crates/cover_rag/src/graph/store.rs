use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use cover_core::error::AppError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{Fact, KnowledgeGraph, LABEL_CHUNK, LABEL_ENTITY, REL_MENTIONS};
use crate::db;

/// Explicitly owned graph connection. Construct once and pass it where needed.
#[derive(Debug)]
pub struct GraphStore {
    conn: Connection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphCounts {
    pub nodes: BTreeMap<String, u64>,
    pub edges: BTreeMap<String, u64>,
}

/// What happens to an existing node's properties on a repeated upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnMatch {
    Keep,
    Merge,
}

impl GraphStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = db::open(path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = db::open_in_memory()?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Idempotent: uniqueness of `(label, key)` and `(src, rel, dst)` lives in the migrations.
    pub fn ensure_schema(&mut self) -> Result<(), AppError> {
        db::migrate(&mut self.conn)
    }

    pub fn close(self) -> Result<(), AppError> {
        self.conn.close().map_err(|(_, e)| {
            AppError::new("INTERNAL_GRAPH_CLOSE_FAILED", "Failed to close graph database")
                .with_details(e.to_string())
        })
    }

    /// Liveness check for the `ping` command.
    pub fn ping(&self) -> Result<(), AppError> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| {
                AppError::new("CONFIG_GRAPH_UNAVAILABLE", "Graph database did not answer")
                    .with_details(e.to_string())
            })
    }

    /// Runs `write` inside one transaction; nothing is committed if it fails.
    pub(crate) fn write_batch<F>(&mut self, write: F) -> Result<(), AppError>
    where
        F: FnOnce(&Connection) -> Result<(), AppError>,
    {
        let tx = self.conn.transaction().map_err(|e| {
            AppError::new("INGEST_TX_FAILED", "Failed to start batch transaction")
                .with_details(e.to_string())
        })?;
        write(&*tx)?;
        tx.commit().map_err(|e| {
            AppError::new("INGEST_TX_FAILED", "Failed to commit batch transaction")
                .with_details(e.to_string())
                .with_retryable(true)
        })
    }

    pub fn counts(&self) -> Result<GraphCounts, AppError> {
        let read_err = |e: rusqlite::Error| {
            AppError::new("INGEST_GRAPH_READ_FAILED", "Failed to count graph contents")
                .with_details(e.to_string())
        };
        let grouped = |sql: &str| -> Result<BTreeMap<String, u64>, AppError> {
            let mut stmt = self.conn.prepare(sql).map_err(read_err)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(read_err)?;
            let mut out = BTreeMap::new();
            for row in rows {
                let (name, count) = row.map_err(read_err)?;
                out.insert(name, count.max(0) as u64);
            }
            Ok(out)
        };

        Ok(GraphCounts {
            nodes: grouped("SELECT label, COUNT(*) FROM nodes GROUP BY label")?,
            edges: grouped("SELECT rel, COUNT(*) FROM edges GROUP BY rel")?,
        })
    }

    /// Stored properties of one node, if it exists.
    pub fn node_props(&self, label: &str, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT props FROM nodes WHERE label = ?1 AND key = ?2",
                params![label, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| {
                AppError::new("INTERNAL_GRAPH_READ_FAILED", "Failed to read node")
                    .with_details(format!("label={label}; key={key}; err={e}"))
            })?;
        raw.map(|s| {
            serde_json::from_str(&s).map_err(|e| {
                AppError::new("INTERNAL_GRAPH_READ_FAILED", "Stored node properties are not JSON")
                    .with_details(format!("label={label}; key={key}; err={e}"))
            })
        })
        .transpose()
    }

    pub fn checkpoint(&self, job: &str) -> Result<Option<usize>, AppError> {
        let processed: Option<i64> = self
            .conn
            .query_row(
                "SELECT processed FROM ingest_checkpoints WHERE job = ?1",
                [job],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| {
                AppError::new("INGEST_CHECKPOINT_FAILED", "Failed to read ingest checkpoint")
                    .with_details(format!("job={job}; err={e}"))
            })?;
        Ok(processed.map(|p| p.max(0) as usize))
    }

    /// Keys of every record a job has committed, in any run since its last reset.
    pub(crate) fn committed_keys(&self, job: &str) -> Result<HashSet<String>, AppError> {
        let read_err = |e: rusqlite::Error| {
            AppError::new("INGEST_CHECKPOINT_FAILED", "Failed to read checkpoint keys")
                .with_details(format!("job={job}; err={e}"))
        };
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM ingest_checkpoint_keys WHERE job = ?1")
            .map_err(read_err)?;
        let rows = stmt
            .query_map([job], |row| row.get::<_, String>(0))
            .map_err(read_err)?;
        rows.collect::<Result<HashSet<_>, _>>().map_err(read_err)
    }

    pub(crate) fn reset_checkpoint(&mut self, job: &str) -> Result<(), AppError> {
        self.write_batch(|conn| {
            conn.execute("DELETE FROM ingest_checkpoint_keys WHERE job = ?1", [job])
                .map_err(|e| {
                    AppError::new("INGEST_CHECKPOINT_FAILED", "Failed to reset ingest checkpoint")
                        .with_details(format!("job={job}; err={e}"))
                })?;
            Ok(())
        })?;
        self.save_checkpoint(job, 0)
    }

    pub(crate) fn save_checkpoint(&self, job: &str, processed: usize) -> Result<(), AppError> {
        let updated_at = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
            AppError::new("INGEST_CHECKPOINT_FAILED", "Failed to format checkpoint timestamp")
                .with_details(e.to_string())
        })?;
        self.conn
            .execute(
                "INSERT INTO ingest_checkpoints(job, processed, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(job) DO UPDATE SET processed = excluded.processed, updated_at = excluded.updated_at",
                params![job, processed as i64, updated_at],
            )
            .map_err(|e| {
                AppError::new("INGEST_CHECKPOINT_FAILED", "Failed to save ingest checkpoint")
                    .with_details(format!("job={job}; err={e}"))
            })?;
        Ok(())
    }
}

impl KnowledgeGraph for GraphStore {
    fn related_facts(&self, entity: &str, limit: usize) -> Result<Vec<Fact>, AppError> {
        let query_err = |e: rusqlite::Error| {
            AppError::new("RETRIEVAL_GRAPH_QUERY_FAILED", "Failed to read graph facts")
                .with_details(format!("entity={entity}; err={e}"))
                .with_retryable(true)
        };
        // Undirected neighbourhood; the entity is always the subject.
        let mut stmt = self
            .conn
            .prepare(
                "SELECT e.id AS edge_id, x.name, e.rel, COALESCE(y.name, y.label)
                   FROM nodes x JOIN edges e ON e.src = x.id JOIN nodes y ON y.id = e.dst
                  WHERE x.label = ?1 AND x.key = ?2
                 UNION ALL
                 SELECT e.id AS edge_id, x.name, e.rel, COALESCE(y.name, y.label)
                   FROM nodes x JOIN edges e ON e.dst = x.id JOIN nodes y ON y.id = e.src
                  WHERE x.label = ?1 AND x.key = ?2
                 ORDER BY edge_id
                 LIMIT ?3",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![LABEL_ENTITY, entity, limit as i64], |row| {
                Ok(Fact::new(
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn mentioning_previews(&self, entity: &str, limit: usize) -> Result<Vec<String>, AppError> {
        let query_err = |e: rusqlite::Error| {
            AppError::new("RETRIEVAL_GRAPH_QUERY_FAILED", "Failed to read chunk previews")
                .with_details(format!("entity={entity}; err={e}"))
                .with_retryable(true)
        };
        let mut stmt = self
            .conn
            .prepare(
                "SELECT json_extract(c.props, '$.preview')
                   FROM nodes e
                   JOIN edges m ON m.dst = e.id AND m.rel = ?3
                   JOIN nodes c ON c.id = m.src AND c.label = ?2
                  WHERE e.label = ?1 AND e.key = ?4
                  ORDER BY m.id
                  LIMIT ?5",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(
                params![LABEL_ENTITY, LABEL_CHUNK, REL_MENTIONS, entity, limit as i64],
                |row| row.get::<_, Option<String>>(0),
            )
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            if let Some(preview) = row.map_err(query_err)? {
                if !preview.is_empty() {
                    out.push(preview);
                }
            }
        }
        Ok(out)
    }
}

/// Upserts a node by `(label, key)` and returns its id.
pub(crate) fn upsert_node(
    conn: &Connection,
    label: &str,
    key: &str,
    name: Option<&str>,
    props: &serde_json::Value,
    on_match: OnMatch,
) -> Result<i64, AppError> {
    let write_err = |e: rusqlite::Error| {
        AppError::new("INGEST_GRAPH_WRITE_FAILED", "Failed to upsert graph node")
            .with_details(format!("label={label}; key={key}; err={e}"))
            .with_retryable(true)
    };
    let props = props.to_string();
    let sql = match on_match {
        OnMatch::Keep => {
            "INSERT INTO nodes(label, key, name, props) VALUES (?1, ?2, ?3, json(?4))
             ON CONFLICT(label, key) DO NOTHING"
        }
        // json_patch drops keys whose new value is null.
        OnMatch::Merge => {
            "INSERT INTO nodes(label, key, name, props) VALUES (?1, ?2, ?3, json(?4))
             ON CONFLICT(label, key) DO UPDATE SET
               name = COALESCE(excluded.name, nodes.name),
               props = json_patch(nodes.props, excluded.props)"
        }
    };
    conn.execute(sql, params![label, key, name, props])
        .map_err(write_err)?;
    conn.query_row(
        "SELECT id FROM nodes WHERE label = ?1 AND key = ?2",
        params![label, key],
        |row| row.get(0),
    )
    .map_err(write_err)
}

/// Written in the batch's own transaction, so a key is recorded only if its record committed.
pub(crate) fn record_committed_keys<'a, I>(
    conn: &Connection,
    job: &str,
    keys: I,
) -> Result<(), AppError>
where
    I: IntoIterator<Item = &'a str>,
{
    let write_err = |e: rusqlite::Error| {
        AppError::new("INGEST_CHECKPOINT_FAILED", "Failed to record checkpoint keys")
            .with_details(format!("job={job}; err={e}"))
    };
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO ingest_checkpoint_keys(job, key) VALUES (?1, ?2)
             ON CONFLICT(job, key) DO NOTHING",
        )
        .map_err(write_err)?;
    for key in keys {
        stmt.execute(params![job, key]).map_err(write_err)?;
    }
    Ok(())
}

pub(crate) fn link(conn: &Connection, src: i64, rel: &str, dst: i64) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO edges(src, rel, dst) VALUES (?1, ?2, ?3) ON CONFLICT(src, rel, dst) DO NOTHING",
        params![src, rel, dst],
    )
    .map_err(|e| {
        AppError::new("INGEST_GRAPH_WRITE_FAILED", "Failed to upsert graph edge")
            .with_details(format!("src={src}; rel={rel}; dst={dst}; err={e}"))
            .with_retryable(true)
    })?;
    Ok(())
}
