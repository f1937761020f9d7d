// LanceDB vector database module
// Handles per-document collections and similarity search for chunk embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::ingest::SegmentMetadata;

pub use vector_store::VectorStore;

/// Data stored next to each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// The chunk text
    pub page_content: String,
    pub metadata: SegmentMetadata,
}

/// A stored point returned from a similarity query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPoint {
    /// Positional id, 1-based in insertion order
    pub id: u64,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub payload: Payload,
}

/// Outcome of looking up or creating a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// The collection holds no points yet
    Empty { created: bool },
    /// The collection already holds `points` points
    Populated { points: u64 },
}

impl CollectionStatus {
    #[inline]
    pub fn point_count(self) -> u64 {
        match self {
            Self::Empty { .. } => 0,
            Self::Populated { points } => points,
        }
    }

    #[inline]
    pub fn is_populated(self) -> bool {
        matches!(self, Self::Populated { .. })
    }
}
