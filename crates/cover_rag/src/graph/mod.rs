//! Knowledge graph over SQLite: nodes keyed by `(label, key)`, edges unique per
//! `(src, rel, dst)`. Every write is an upsert, nothing is deleted.

use cover_core::error::AppError;
use serde::{Deserialize, Serialize};

pub mod ingest;
pub mod records;
pub mod store;

pub use ingest::{chunk_id, ingest_chunks, prepare_chunk, ChunkRecord, IngestOptions, IngestSummary, PreparedChunk};
pub use records::ingest_policy_records;
pub use store::{GraphCounts, GraphStore};

pub const LABEL_SOURCE: &str = "Source";
pub const LABEL_CHUNK: &str = "Chunk";
pub const LABEL_ENTITY: &str = "Entity";
pub const LABEL_POLICY: &str = "Policy";
pub const LABEL_USER: &str = "User";
pub const LABEL_COUNTRY: &str = "Country";
pub const LABEL_DISEASE: &str = "Disease";
pub const LABEL_VEHICLE: &str = "Vehicle";
pub const LABEL_HOUSE: &str = "House";
pub const LABEL_TRIP: &str = "Trip";

pub const REL_HAS_CHUNK: &str = "HAS_CHUNK";
pub const REL_MENTIONS: &str = "MENTIONS";
pub const REL_CO_OCCURS: &str = "CO_OCCURS";
pub const REL_APPLICABLE_IN: &str = "APPLICABLE_IN";
pub const REL_HOLDS: &str = "HOLDS";
pub const REL_COVERS: &str = "COVERS";
pub const REL_HAS_TRIP: &str = "HAS_TRIP";
pub const REL_DESTINATION: &str = "DESTINATION";

/// One `(subject, relation, object)` triple around an entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Fact {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl Fact {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

/// Graph side of hybrid retrieval. An `Err` means the store could not answer; an empty
/// `Vec` means it answered and found nothing.
pub trait KnowledgeGraph {
    fn related_facts(&self, entity: &str, limit: usize) -> Result<Vec<Fact>, AppError>;
    fn mentioning_previews(&self, entity: &str, limit: usize) -> Result<Vec<String>, AppError>;
}
