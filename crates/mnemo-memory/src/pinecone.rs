//! Pinecone vector store adapter
//!
//! Managed backend. One vector per record in the `memory-mcp` namespace,
//! metadata as a flat object with tags joined by `","`. Layer and
//! importance filters map to native predicates (`$eq`, `$gte`); the
//! contains-all tag filter cannot be expressed against the joined string,
//! so it is applied client-side after 2x over-fetch. Listing is emulated by
//! querying a zero vector with limit 1,000.

use crate::store::{relevance_from_cosine, ScoredRecord, SearchFilter, VectorStore};
use crate::types::{MemoryId, MemoryRecord};
use async_trait::async_trait;
use mnemo_core::config::PineconeConfig;
use mnemo_core::constants::{
    BACKEND_BATCH_SIZE_MAX, BACKEND_REQUEST_TIMEOUT_MS_DEFAULT, LIST_LIMIT_MAX,
    SEARCH_OVERFETCH_FACTOR,
};
use mnemo_core::error::{Error, Result};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Namespace all records live in
const NAMESPACE: &str = "memory-mcp";

pub struct PineconeVectorStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PineconeVectorStore {
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::config("PINECONE_API_KEY", "required for the pinecone store"))?;

        let base_url = if config.index.starts_with("http") {
            config.index.trim_end_matches('/').to_string()
        } else {
            format!("https://{}.svc.pinecone.io", config.index)
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(BACKEND_REQUEST_TIMEOUT_MS_DEFAULT))
            .build()
            .map_err(|e| Error::backend("pinecone client build failed", e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::backend("pinecone request failed", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::backend(
                "pinecone request rejected",
                format!("{path} status {status}: {detail}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::backend("pinecone response unreadable", e.to_string()))
    }

    fn metadata(record: &MemoryRecord) -> Value {
        json!({
            "content": record.content,
            "timestampMs": record.timestamp,
            "importance": record.importance,
            "source": record.source.as_str(),
            "tags": record.tags.join(","),
            "accessCount": record.access_count,
            "lastAccessedMs": record.last_accessed,
            "layer": record.layer.as_str(),
        })
    }

    fn vector_body(record: &MemoryRecord) -> Result<Value> {
        let values = record
            .embedding
            .as_deref()
            .ok_or_else(|| Error::validation("embedding", "required for store"))?;
        Ok(json!({
            "id": record.id.to_string(),
            "values": values,
            "metadata": Self::metadata(record),
        }))
    }

    fn record_from_match(id: &str, metadata: &Value, values: Option<Vec<f32>>) -> Result<MemoryRecord> {
        let parse_err =
            |field: &str| Error::backend("pinecone metadata malformed", format!("missing {field}"));

        let tags = metadata["tags"]
            .as_str()
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(MemoryRecord {
            id: id.parse()?,
            content: metadata["content"]
                .as_str()
                .ok_or_else(|| parse_err("content"))?
                .to_string(),
            embedding: values,
            timestamp: metadata["timestampMs"]
                .as_f64()
                .ok_or_else(|| parse_err("timestampMs"))? as i64,
            importance: metadata["importance"]
                .as_f64()
                .ok_or_else(|| parse_err("importance"))? as f32,
            source: metadata["source"]
                .as_str()
                .ok_or_else(|| parse_err("source"))?
                .parse()?,
            tags,
            access_count: metadata["accessCount"].as_f64().unwrap_or(0.0) as u64,
            last_accessed: metadata["lastAccessedMs"]
                .as_f64()
                .ok_or_else(|| parse_err("lastAccessedMs"))? as i64,
            layer: metadata["layer"]
                .as_str()
                .ok_or_else(|| parse_err("layer"))?
                .parse()?,
        })
    }

    /// Predicates Pinecone can evaluate server-side
    fn native_filter(filter: &SearchFilter) -> Option<Value> {
        let mut predicates = Map::new();
        if let Some(layer) = filter.layer {
            predicates.insert("layer".into(), json!({ "$eq": layer.as_str() }));
        }
        if let Some(min) = filter.min_importance {
            predicates.insert("importance".into(), json!({ "$gte": min }));
        }
        if predicates.is_empty() {
            None
        } else {
            Some(Value::Object(predicates))
        }
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
        include_values: bool,
    ) -> Result<Vec<(MemoryRecord, f32)>> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "namespace": NAMESPACE,
            "includeMetadata": true,
            "includeValues": include_values,
        });
        if let Some(native) = filter.and_then(Self::native_filter) {
            body["filter"] = native;
        }

        let response = self.post("/query", body).await?;
        let matches = response["matches"].as_array().cloned().unwrap_or_default();

        let mut records = Vec::with_capacity(matches.len());
        for entry in &matches {
            let id = entry["id"].as_str().unwrap_or_default();
            let values = entry["values"].as_array().map(|vs| {
                vs.iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect()
            });
            let record = Self::record_from_match(id, &entry["metadata"], values)?;
            let score = entry["score"].as_f64().unwrap_or(0.0) as f32;
            records.push((record, score));
        }
        Ok(records)
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    async fn initialize(&self) -> Result<()> {
        // The index is provisioned out of band; reachability is the check.
        self.post("/describe_index_stats", json!({})).await?;
        Ok(())
    }

    async fn store(&self, record: &MemoryRecord) -> Result<()> {
        self.store_batch(std::slice::from_ref(record)).await
    }

    async fn store_batch(&self, records: &[MemoryRecord]) -> Result<()> {
        for chunk in records.chunks(BACKEND_BATCH_SIZE_MAX) {
            let vectors: Result<Vec<Value>> = chunk.iter().map(Self::vector_body).collect();
            self.post(
                "/vectors/upsert",
                json!({ "vectors": vectors?, "namespace": NAMESPACE }),
            )
            .await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        let needs_tag_filter = filter
            .and_then(|f| f.tags.as_ref())
            .map_or(false, |tags| !tags.is_empty());
        let fetch_k = if needs_tag_filter {
            k * SEARCH_OVERFETCH_FACTOR
        } else {
            k
        };

        let mut hits = Vec::new();
        for (record, score) in self.query(vector, fetch_k, filter, false).await? {
            if let Some(f) = filter {
                if !f.matches(&record) {
                    continue;
                }
            }
            hits.push(ScoredRecord {
                record,
                relevance: relevance_from_cosine(score),
            });
            if hits.len() == k {
                break;
            }
        }
        Ok(hits)
    }

    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        let response = self
            .post(
                "/vectors/fetch",
                json!({ "ids": [id.to_string()], "namespace": NAMESPACE }),
            )
            .await?;

        let entry = &response["vectors"][id.to_string()];
        if entry.is_null() {
            return Ok(None);
        }

        let values = entry["values"].as_array().map(|vs| {
            vs.iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect()
        });
        Self::record_from_match(&id.to_string(), &entry["metadata"], values).map(Some)
    }

    async fn delete(&self, id: &MemoryId) -> Result<bool> {
        // Pinecone's delete reports nothing, so existence is checked first.
        let existed = self.get(id).await?.is_some();
        if existed {
            self.post(
                "/vectors/delete",
                json!({ "ids": [id.to_string()], "namespace": NAMESPACE }),
            )
            .await?;
        }
        Ok(existed)
    }

    async fn list(&self, filter: Option<&SearchFilter>) -> Result<Vec<MemoryRecord>> {
        // No scan API: query against a zero vector and keep the metadata.
        let probe = vec![0.0f32; self.probe_dimension().await?];
        let mut records = Vec::new();
        for (record, _) in self.query(&probe, LIST_LIMIT_MAX, filter, false).await? {
            if filter.map_or(true, |f| f.matches(&record)) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn update(&self, record: &MemoryRecord) -> Result<()> {
        // Upsert replaces the whole vector atomically. Without an embedding
        // on hand the stored values are re-read first.
        if record.embedding.is_some() {
            return self.store(record).await;
        }

        let stored = self
            .get(&record.id)
            .await?
            .ok_or_else(|| Error::not_found("memory", record.id.to_string()))?;
        let mut replacement = record.clone();
        replacement.embedding = stored.embedding;
        if replacement.embedding.is_none() {
            return Err(Error::conflicting_state(
                record.id.to_string(),
                "stored vector has no values",
            ));
        }
        self.store(&replacement).await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl PineconeVectorStore {
    /// Dimension of the index, learned from stats; needed for the zero-vector probe
    async fn probe_dimension(&self) -> Result<usize> {
        let stats = self.post("/describe_index_stats", json!({})).await?;
        stats["dimension"]
            .as_u64()
            .map(|d| d as usize)
            .ok_or_else(|| Error::backend("pinecone stats malformed", "missing dimension"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryLayer, MemorySource};

    fn sample_record() -> MemoryRecord {
        let mut record = MemoryRecord::new(
            "pinned",
            0.7,
            MemorySource::User,
            vec!["alpha".into(), "beta".into()],
            MemoryLayer::ShortTerm,
        );
        record.embedding = Some(vec![0.3, 0.4]);
        record
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = PineconeConfig {
            api_key: None,
            index: "memory-mcp".into(),
        };
        assert!(PineconeVectorStore::new(&config).is_err());
    }

    #[test]
    fn test_metadata_is_flat_with_joined_tags() {
        let record = sample_record();
        let metadata = PineconeVectorStore::metadata(&record);

        assert_eq!(metadata["tags"], "alpha,beta");
        assert_eq!(metadata["layer"], "short-term");
        assert!(metadata.as_object().unwrap().values().all(|v| !v.is_object()));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let record = sample_record();
        let metadata = PineconeVectorStore::metadata(&record);
        let parsed = PineconeVectorStore::record_from_match(
            &record.id.to_string(),
            &metadata,
            record.embedding.clone(),
        )
        .unwrap();

        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.tags, vec!["alpha", "beta"]);
        assert_eq!(parsed.layer, MemoryLayer::ShortTerm);
        assert_eq!(parsed.embedding, record.embedding);
    }

    #[test]
    fn test_native_filter_covers_layer_and_importance() {
        let filter = SearchFilter {
            layer: Some(MemoryLayer::LongTerm),
            tags: Some(vec!["alpha".into()]),
            min_importance: Some(0.5),
        };
        let native = PineconeVectorStore::native_filter(&filter).unwrap();

        assert_eq!(native["layer"]["$eq"], "long-term");
        assert_eq!(native["importance"]["$gte"], 0.5);
        // Tags stay client-side.
        assert!(native.get("tags").is_none());
    }

    #[test]
    fn test_native_filter_absent_when_unconstrained() {
        let filter = SearchFilter {
            tags: Some(vec!["alpha".into()]),
            ..Default::default()
        };
        assert!(PineconeVectorStore::native_filter(&filter).is_none());
    }

    #[test]
    fn test_vector_body_requires_embedding() {
        let mut record = sample_record();
        record.embedding = None;
        assert!(PineconeVectorStore::vector_body(&record).is_err());
    }
}
