use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use cover_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::similarity::{cosine_similarity, l2_norm};
use super::{VectorHit, VectorSearch};
use crate::embeddings::Embedder;
use crate::graph::{chunk_id, ChunkRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub chunk_count: u32,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBuildInput {
    pub model: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct StoredDocument {
    source: String,
    content: String,
    content_sha256: String,
}

/// JSON-file vector index: documents, their embeddings and a status record, each written
/// through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    root: PathBuf,
}

impl VectorIndex {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn status_path(&self) -> PathBuf {
        self.root.join("index_status.json")
    }

    fn documents_path(&self) -> PathBuf {
        self.root.join("index_documents.json")
    }

    fn vectors_path(&self) -> PathBuf {
        self.root.join("index_vectors.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new("INGEST_INDEX_BUILD_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        Ok(read_json(&self.status_path())?.unwrap_or(IndexStatus {
            ready: false,
            model: None,
            dims: None,
            chunk_count: 0,
            updated_at: None,
        }))
    }

    /// Indexed chunks in chunk-id order; this is what graph ingestion reads.
    pub fn documents(&self) -> Result<Vec<ChunkRecord>, AppError> {
        let docs: BTreeMap<String, StoredDocument> =
            read_json(&self.documents_path())?.unwrap_or_default();
        Ok(docs
            .into_values()
            .map(|d| ChunkRecord {
                source: d.source,
                content: d.content,
            })
            .collect())
    }

    /// (Re)builds the index for exactly `chunks`. Unchanged chunks keep their vectors when
    /// the model is the same; nothing is written unless every embedding succeeds.
    pub fn build_with_embedder(
        &self,
        chunks: &[ChunkRecord],
        embedder: &dyn Embedder,
        input: IndexBuildInput,
    ) -> Result<IndexStatus, AppError> {
        self.ensure_dirs()?;

        let mut wanted: BTreeMap<String, StoredDocument> = BTreeMap::new();
        for c in chunks.iter().filter(|c| !c.content.trim().is_empty()) {
            wanted.insert(
                chunk_id(&c.source, &c.content),
                StoredDocument {
                    source: c.source.clone(),
                    content: c.content.clone(),
                    content_sha256: sha256_hex(c.content.as_bytes()),
                },
            );
        }
        if wanted.is_empty() {
            return Err(AppError::new(
                "INGEST_INDEX_EMPTY",
                "No chunks with content; nothing to index",
            ));
        }

        let current = self.status()?;
        let compatible = current.ready && current.model.as_deref() == Some(input.model.as_str());

        let (mut vectors, previous_docs): (BTreeMap<String, Vec<f32>>, BTreeMap<String, StoredDocument>) =
            if compatible {
                (
                    read_json(&self.vectors_path())?.unwrap_or_default(),
                    read_json(&self.documents_path())?.unwrap_or_default(),
                )
            } else {
                (BTreeMap::new(), BTreeMap::new())
            };

        let keep: BTreeSet<&String> = wanted.keys().collect();
        vectors.retain(|k, _| keep.contains(k));

        let to_embed: Vec<&String> = wanted
            .iter()
            .filter(|(id, doc)| {
                let unchanged = previous_docs
                    .get(*id)
                    .is_some_and(|prev| prev.content_sha256 == doc.content_sha256);
                !(unchanged && vectors.contains_key(*id))
            })
            .map(|(id, _)| id)
            .collect();
        info!(total = wanted.len(), to_embed = to_embed.len(), model = %input.model, "building vector index");

        let mut dims: Option<u32> = if compatible { current.dims } else { None };
        for id in to_embed {
            let doc = &wanted[id];
            let v = embedder.embed(&input.model, &doc.content).map_err(|e| {
                AppError::new("INGEST_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                    .with_details(format!("chunk_id={id}; err={e}"))
                    .with_retryable(e.retryable)
            })?;
            let this_dims = v.len() as u32;
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new(
                        "INGEST_INDEX_BUILD_FAILED",
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!("expected={d}; got={this_dims}; chunk_id={id}")));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }
            vectors.insert(id.clone(), v);
        }

        write_json(&self.vectors_path(), &vectors)?;
        write_json(&self.documents_path(), &wanted)?;
        let status = IndexStatus {
            ready: true,
            model: Some(input.model),
            dims,
            chunk_count: vectors.len() as u32,
            updated_at: Some(input.updated_at),
        };
        write_json(&self.status_path(), &status)?;
        Ok(status)
    }

    /// Cosine top-k. Ties break on chunk id so results are stable.
    pub fn search_with_embedder(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        let q = query.trim();
        if q.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let st = self.status()?;
        let (Some(model), Some(dims), true) = (st.model.clone(), st.dims, st.ready) else {
            return Err(AppError::new(
                "RETRIEVAL_INDEX_NOT_READY",
                "Vector index not ready; run `index` first",
            )
            .with_details(format!("path={}", self.root.display())));
        };

        let qv = embedder.embed(&model, q)?;
        if qv.len() as u32 != dims {
            return Err(AppError::new(
                "RETRIEVAL_VECTOR_FAILED",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
        }
        let qnorm = l2_norm(&qv);
        if qnorm == 0.0 {
            return Err(AppError::new(
                "RETRIEVAL_VECTOR_FAILED",
                "Query embedding norm is zero",
            ));
        }

        let vectors: BTreeMap<String, Vec<f32>> =
            read_json(&self.vectors_path())?.unwrap_or_default();
        let mut docs: BTreeMap<String, StoredDocument> =
            read_json(&self.documents_path())?.unwrap_or_default();

        let mut scored: Vec<(String, f32)> = Vec::with_capacity(vectors.len());
        for (id, v) in vectors.iter() {
            if v.len() as u32 != dims {
                return Err(AppError::new("RETRIEVAL_VECTOR_FAILED", "Index vector dims mismatch")
                    .with_details(format!("chunk_id={id}; expected={dims}; got={}", v.len())));
            }
            let vnorm = l2_norm(v);
            if vnorm == 0.0 {
                continue;
            }
            scored.push((id.clone(), cosine_similarity(&qv, v, qnorm, vnorm)));
        }
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        debug!(hits = scored.len(), k, "vector search");

        Ok(scored
            .into_iter()
            .filter_map(|(id, _)| docs.remove(&id))
            .map(|d| VectorHit {
                content: d.content,
                source: d.source,
            })
            .collect())
    }
}

/// Pairs an index with the embedder that built it.
pub struct EmbeddingSearch<E> {
    index: VectorIndex,
    embedder: E,
}

impl<E: Embedder> EmbeddingSearch<E> {
    pub fn new(index: VectorIndex, embedder: E) -> Self {
        Self { index, embedder }
    }
}

impl<E: Embedder> VectorSearch for EmbeddingSearch<E> {
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<VectorHit>, AppError> {
        self.index.search_with_embedder(&self.embedder, query, k)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("RETRIEVAL_INDEX_READ_FAILED", "Failed to read index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        AppError::new("RETRIEVAL_INDEX_READ_FAILED", "Failed to decode index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("INGEST_INDEX_BUILD_FAILED", "Failed to encode index file")
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("INGEST_INDEX_BUILD_FAILED", "Failed to write index file")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("INGEST_INDEX_BUILD_FAILED", "Failed to finalize index file write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
