//! In-process vector store
//!
//! The default backend and the one the test suite runs against. Search is a
//! linear scan computing cosine similarity; fine for the corpus sizes a
//! single agent accumulates.

use crate::store::{
    cosine_similarity, relevance_from_cosine, ScoredRecord, SearchFilter, VectorStore,
};
use crate::types::{MemoryId, MemoryRecord};
use async_trait::async_trait;
use mnemo_core::constants::LIST_LIMIT_MAX;
use mnemo_core::error::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Map-backed vector store keyed by record id
pub struct MemoryVectorStore {
    records: RwLock<HashMap<MemoryId, MemoryRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn store(&self, record: &MemoryRecord) -> Result<()> {
        if record.embedding.is_none() {
            return Err(Error::validation("embedding", "required for store"));
        }
        self.records
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        let records = self.records.read().await;

        let mut hits: Vec<ScoredRecord> = records
            .values()
            .filter(|r| filter.map_or(true, |f| f.matches(r)))
            .filter_map(|r| {
                r.embedding.as_ref().map(|e| ScoredRecord {
                    relevance: relevance_from_cosine(cosine_similarity(vector, e)),
                    record: r.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &MemoryId) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn list(&self, filter: Option<&SearchFilter>) -> Result<Vec<MemoryRecord>> {
        let records = self.records.read().await;

        let mut matched: Vec<MemoryRecord> = records
            .values()
            .filter(|r| filter.map_or(true, |f| f.matches(r)))
            .cloned()
            .collect();

        // Newest first keeps the cap deterministic.
        matched.sort_by_key(|r| std::cmp::Reverse(r.timestamp));
        matched.truncate(LIST_LIMIT_MAX);
        Ok(matched)
    }

    async fn update(&self, record: &MemoryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                let mut replacement = record.clone();
                // Preserve the stored vector when the caller carries none.
                if replacement.embedding.is_none() {
                    replacement.embedding = existing.embedding.take();
                }
                *existing = replacement;
                Ok(())
            }
            None => Err(Error::not_found("memory", record.id.to_string())),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
