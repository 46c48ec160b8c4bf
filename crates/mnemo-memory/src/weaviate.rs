//! Weaviate vector store adapter
//!
//! Self-hosted backend. Records persist as objects of class `Memory` with
//! externally-supplied vectors; similarity search goes through GraphQL
//! `nearVector`, CRUD through the REST objects API. Weaviate's `certainty`
//! is already cosine scaled to `[0, 1]`, so it is used as relevance
//! directly. Filters are applied client-side with 2x over-fetch whenever
//! any filter is set.

use crate::store::{ScoredRecord, SearchFilter, VectorStore};
use crate::types::{MemoryId, MemoryRecord};
use async_trait::async_trait;
use mnemo_core::config::WeaviateConfig;
use mnemo_core::constants::{
    BACKEND_BATCH_SIZE_MAX, BACKEND_REQUEST_TIMEOUT_MS_DEFAULT, LIST_LIMIT_MAX,
    SEARCH_OVERFETCH_FACTOR,
};
use mnemo_core::error::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// Weaviate class holding memory records
const CLASS_NAME: &str = "Memory";

pub struct WeaviateVectorStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeaviateVectorStore {
    pub fn new(config: &WeaviateConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::config("WEAVIATE_URL", "required for the weaviate store"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(BACKEND_REQUEST_TIMEOUT_MS_DEFAULT))
            .build()
            .map_err(|e| Error::backend("weaviate client build failed", e.to_string()))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    fn object_body(record: &MemoryRecord, vector: &[f32]) -> Value {
        json!({
            "class": CLASS_NAME,
            "id": record.id.to_string(),
            "properties": Self::properties(record),
            "vector": vector,
        })
    }

    fn properties(record: &MemoryRecord) -> Value {
        json!({
            "content": record.content,
            "timestampMs": record.timestamp,
            "importance": record.importance,
            "source": record.source.as_str(),
            "tags": record.tags,
            "accessCount": record.access_count,
            "lastAccessedMs": record.last_accessed,
            "layer": record.layer.as_str(),
        })
    }

    fn record_from_properties(
        id: &str,
        properties: &Value,
        vector: Option<Vec<f32>>,
    ) -> Result<MemoryRecord> {
        let parse_err =
            |field: &str| Error::backend("weaviate object malformed", format!("missing {field}"));

        Ok(MemoryRecord {
            id: id.parse()?,
            content: properties["content"]
                .as_str()
                .ok_or_else(|| parse_err("content"))?
                .to_string(),
            embedding: vector,
            timestamp: properties["timestampMs"]
                .as_i64()
                .ok_or_else(|| parse_err("timestampMs"))?,
            importance: properties["importance"]
                .as_f64()
                .ok_or_else(|| parse_err("importance"))? as f32,
            source: properties["source"]
                .as_str()
                .ok_or_else(|| parse_err("source"))?
                .parse()?,
            tags: properties["tags"]
                .as_array()
                .map(|tags| {
                    tags.iter()
                        .filter_map(|t| t.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            access_count: properties["accessCount"].as_u64().unwrap_or(0),
            last_accessed: properties["lastAccessedMs"]
                .as_i64()
                .ok_or_else(|| parse_err("lastAccessedMs"))?,
            layer: properties["layer"]
                .as_str()
                .ok_or_else(|| parse_err("layer"))?
                .parse()?,
        })
    }

    async fn graphql(&self, query: String) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, "/v1/graphql")
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| Error::backend("weaviate graphql request failed", e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::backend("weaviate graphql response unreadable", e.to_string()))?;

        if !status.is_success() || body.get("errors").map_or(false, |e| !e.is_null()) {
            return Err(Error::backend(
                "weaviate graphql query rejected",
                format!("status {status}: {body}"),
            ));
        }
        Ok(body)
    }

    fn graphql_hits(body: &Value) -> Vec<&Value> {
        body["data"]["Get"][CLASS_NAME]
            .as_array()
            .map(|hits| hits.iter().collect())
            .unwrap_or_default()
    }

    /// Shared projection of record properties for GraphQL queries
    const PROJECTION: &'static str =
        "content timestampMs importance source tags accessCount lastAccessedMs layer";

    async fn replace_object(&self, record: &MemoryRecord, vector: &[f32]) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/v1/objects/{CLASS_NAME}/{}", record.id),
            )
            .json(&Self::object_body(record, vector))
            .send()
            .await
            .map_err(|e| Error::backend("weaviate update failed", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::backend(
                "weaviate update rejected",
                format!("status {status}: {detail}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for WeaviateVectorStore {
    async fn initialize(&self) -> Result<()> {
        let existing = self
            .request(reqwest::Method::GET, &format!("/v1/schema/{CLASS_NAME}"))
            .send()
            .await
            .map_err(|e| Error::backend("weaviate unreachable", e.to_string()))?;

        if existing.status().is_success() {
            return Ok(());
        }
        if existing.status() != reqwest::StatusCode::NOT_FOUND {
            let status = existing.status();
            return Err(Error::backend(
                "weaviate schema check failed",
                format!("status {status}"),
            ));
        }

        let class = json!({
            "class": CLASS_NAME,
            "description": "Agent memory records",
            "vectorizer": "none",
            "properties": [
                { "name": "content", "dataType": ["text"] },
                { "name": "timestampMs", "dataType": ["int"] },
                { "name": "importance", "dataType": ["number"] },
                { "name": "source", "dataType": ["text"] },
                { "name": "tags", "dataType": ["text[]"] },
                { "name": "accessCount", "dataType": ["int"] },
                { "name": "lastAccessedMs", "dataType": ["int"] },
                { "name": "layer", "dataType": ["text"] },
            ],
        });

        let created = self
            .request(reqwest::Method::POST, "/v1/schema")
            .json(&class)
            .send()
            .await
            .map_err(|e| Error::backend("weaviate schema create failed", e.to_string()))?;

        // 422 means another instance won the race; the class exists either way.
        if !created.status().is_success()
            && created.status() != reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            let status = created.status();
            let detail = created.text().await.unwrap_or_default();
            return Err(Error::backend(
                "weaviate schema create rejected",
                format!("status {status}: {detail}"),
            ));
        }
        Ok(())
    }

    async fn store(&self, record: &MemoryRecord) -> Result<()> {
        let vector = record
            .embedding
            .as_deref()
            .ok_or_else(|| Error::validation("embedding", "required for store"))?;

        let response = self
            .request(reqwest::Method::POST, "/v1/objects")
            .json(&Self::object_body(record, vector))
            .send()
            .await
            .map_err(|e| Error::backend("weaviate store failed", e.to_string()))?;

        // Upsert semantics: an existing id is replaced in place.
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return self.replace_object(record, vector).await;
        }
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::backend(
                "weaviate store rejected",
                format!("status {status}: {detail}"),
            ));
        }
        Ok(())
    }

    async fn store_batch(&self, records: &[MemoryRecord]) -> Result<()> {
        for chunk in records.chunks(BACKEND_BATCH_SIZE_MAX) {
            let objects: Result<Vec<Value>> = chunk
                .iter()
                .map(|record| {
                    let vector = record
                        .embedding
                        .as_deref()
                        .ok_or_else(|| Error::validation("embedding", "required for store"))?;
                    Ok(Self::object_body(record, vector))
                })
                .collect();

            let response = self
                .request(reqwest::Method::POST, "/v1/batch/objects")
                .json(&json!({ "objects": objects? }))
                .send()
                .await
                .map_err(|e| Error::backend("weaviate batch store failed", e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(Error::backend(
                    "weaviate batch store rejected",
                    format!("status {status}"),
                ));
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        let filtered = filter.map_or(false, |f| !f.is_empty());
        let fetch_k = if filtered {
            k * SEARCH_OVERFETCH_FACTOR
        } else {
            k
        };

        let vector_json = serde_json::to_string(vector)
            .map_err(|e| Error::internal(format!("vector serialization failed: {e}")))?;
        let query = format!(
            "{{ Get {{ {CLASS_NAME}(limit: {fetch_k}, nearVector: {{vector: {vector_json}}}) \
             {{ {} _additional {{ id certainty }} }} }} }}",
            Self::PROJECTION,
        );

        let body = self.graphql(query).await?;
        let mut hits = Vec::new();
        for hit in Self::graphql_hits(&body) {
            let id = hit["_additional"]["id"].as_str().unwrap_or_default();
            let record = Self::record_from_properties(id, hit, None)?;
            if let Some(f) = filter {
                if !f.matches(&record) {
                    continue;
                }
            }
            let relevance = hit["_additional"]["certainty"].as_f64().unwrap_or(0.0) as f32;
            hits.push(ScoredRecord { record, relevance });
            if hits.len() == k {
                break;
            }
        }
        Ok(hits)
    }

    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/v1/objects/{CLASS_NAME}/{id}?include=vector"),
            )
            .send()
            .await
            .map_err(|e| Error::backend("weaviate get failed", e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::backend(
                "weaviate get rejected",
                format!("status {status}"),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::backend("weaviate object unreadable", e.to_string()))?;

        let vector = body["vector"].as_array().map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect()
        });
        Self::record_from_properties(&id.to_string(), &body["properties"], vector).map(Some)
    }

    async fn delete(&self, id: &MemoryId) -> Result<bool> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/v1/objects/{CLASS_NAME}/{id}"),
            )
            .send()
            .await
            .map_err(|e| Error::backend("weaviate delete failed", e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NO_CONTENT => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::backend(
                "weaviate delete rejected",
                format!("status {status}"),
            )),
        }
    }

    async fn list(&self, filter: Option<&SearchFilter>) -> Result<Vec<MemoryRecord>> {
        let query = format!(
            "{{ Get {{ {CLASS_NAME}(limit: {LIST_LIMIT_MAX}) \
             {{ {} _additional {{ id }} }} }} }}",
            Self::PROJECTION,
        );

        let body = self.graphql(query).await?;
        let mut records = Vec::new();
        for hit in Self::graphql_hits(&body) {
            let id = hit["_additional"]["id"].as_str().unwrap_or_default();
            let record = Self::record_from_properties(id, hit, None)?;
            if filter.map_or(true, |f| f.matches(&record)) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn update(&self, record: &MemoryRecord) -> Result<()> {
        // Weaviate replaces whole objects, so an update without a vector
        // re-reads the stored one first; the PUT swap is atomic per object.
        match record.embedding.as_deref() {
            Some(vector) => self.replace_object(record, vector).await,
            None => {
                let stored = self
                    .get(&record.id)
                    .await?
                    .ok_or_else(|| Error::not_found("memory", record.id.to_string()))?;
                let vector = stored.embedding.ok_or_else(|| {
                    Error::conflicting_state(record.id.to_string(), "stored object has no vector")
                })?;
                self.replace_object(record, &vector).await
            }
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
