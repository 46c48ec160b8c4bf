//! VectorStore capability and shared search types
//!
//! TigerStyle: One trait, three adapters, identical observable semantics.
//!
//! The engine persists every record through this trait. Adapters differ in
//! where bytes live (process heap, Weaviate, Pinecone) but must agree on
//! filter semantics and on the relevance scale: cosine similarity mapped to
//! `[0, 1]` where 1 means identical direction. Adapters that cannot apply a
//! filter server-side apply it client-side after over-fetching and still
//! return up to `k` post-filter matches.

use crate::memory_store::MemoryVectorStore;
use crate::pinecone::PineconeVectorStore;
use crate::types::{MemoryId, MemoryLayer, MemoryRecord};
use crate::weaviate::WeaviateVectorStore;
use async_trait::async_trait;
use mnemo_core::config::{MnemoConfig, VectorStoreKind};
use mnemo_core::error::Result;
use std::sync::Arc;

/// Conjunctive record filter shared by search and list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Restrict to one layer
    pub layer: Option<MemoryLayer>,
    /// Require every listed tag ("contains all")
    pub tags: Option<Vec<String>>,
    /// Require importance at or above this value
    pub min_importance: Option<f32>,
}

impl SearchFilter {
    /// True when no constraint is set
    pub fn is_empty(&self) -> bool {
        self.layer.is_none()
            && self.min_importance.is_none()
            && self.tags.as_ref().map_or(true, |t| t.is_empty())
    }

    /// Evaluate the filter against a record
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if let Some(layer) = self.layer {
            if record.layer != layer {
                return false;
            }
        }
        if let Some(min) = self.min_importance {
            if record.importance < min {
                return false;
            }
        }
        if let Some(ref tags) = self.tags {
            if !tags.iter().all(|t| record.tags.contains(t)) {
                return false;
            }
        }
        true
    }
}

/// A record paired with its search relevance
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    /// Cosine similarity scaled to `[0, 1]`; 1 = identical direction
    pub relevance: f32,
}

/// Persistence and similarity-search capability
///
/// All operations may fail with a backend error; none panic. Per-id write
/// ordering is the caller's responsibility (the manager holds a per-id
/// critical section around mutations).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotently ensure any required schema or index exists
    async fn initialize(&self) -> Result<()>;

    /// Upsert a record by id; `embedding` must be present
    async fn store(&self, record: &MemoryRecord) -> Result<()>;

    /// Upsert many records, chunked internally to backend batch limits
    async fn store_batch(&self, records: &[MemoryRecord]) -> Result<()> {
        for record in records {
            self.store(record).await?;
        }
        Ok(())
    }

    /// Top-k records by cosine similarity, optionally filtered
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredRecord>>;

    /// Fetch a record by id
    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>>;

    /// Delete by id; returns whether a record existed
    async fn delete(&self, id: &MemoryId) -> Result<bool>;

    /// Delete many ids; returns how many existed
    async fn delete_batch(&self, ids: &[MemoryId]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete(id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// List records matching a filter, capped at 1,000
    async fn list(&self, filter: Option<&SearchFilter>) -> Result<Vec<MemoryRecord>>;

    /// Replace a record by id
    ///
    /// Adapters that cannot update metadata while preserving the stored
    /// vector re-fetch the vector and write a full replacement; the swap
    /// must be observable before this call returns.
    async fn update(&self, record: &MemoryRecord) -> Result<()>;

    /// Release backend resources
    async fn close(&self) -> Result<()>;
}

/// Build the configured vector store adapter
///
/// The caller runs `initialize()` afterwards; an unreachable backend at
/// startup is a fatal-init condition.
pub fn build_vector_store(config: &MnemoConfig) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store {
        VectorStoreKind::Memory => Ok(Arc::new(MemoryVectorStore::new())),
        VectorStoreKind::Weaviate => Ok(Arc::new(WeaviateVectorStore::new(&config.weaviate)?)),
        VectorStoreKind::Pinecone => Ok(Arc::new(PineconeVectorStore::new(&config.pinecone)?)),
    }
}

/// Cosine similarity of two vectors
///
/// Unit-norm inputs make this a plain dot product; a zero norm yields 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Map a cosine similarity onto the `[0, 1]` relevance scale
pub fn relevance_from_cosine(cosine: f32) -> f32 {
    ((1.0 + cosine) / 2.0).clamp(0.0, 1.0)
}
