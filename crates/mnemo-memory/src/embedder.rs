//! Embedding generation for semantic search
//!
//! TigerStyle: Trait-based embedder with explicit dimension constraints.
//!
//! Every provider returns unit-normalized vectors so cosine similarity
//! reduces to a dot product downstream. The engine never depends on which
//! provider is active beyond this contract.

use async_trait::async_trait;
use mnemo_core::config::{EmbeddingProviderKind, MnemoConfig};
use mnemo_core::constants::{
    BACKEND_BATCH_SIZE_MAX, BACKEND_REQUEST_TIMEOUT_MS_DEFAULT, EMBEDDING_DIM_LOCAL,
};
use mnemo_core::error::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for generating text embeddings
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Get the dimension of embeddings produced by this embedder
    fn dimension(&self) -> usize;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Embed a single text string
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts in a batch (more efficient for many texts)
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Build the configured embedding provider
pub fn build_embedder(config: &MnemoConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding_provider {
        EmbeddingProviderKind::OpenAi => {
            let api_key = config.openai.api_key.clone().ok_or_else(|| {
                Error::config("OPENAI_API_KEY", "required when EMBEDDING_PROVIDER=openai")
            })?;
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                config.openai.model.clone(),
                config.openai.dimensions,
            )))
        }
        EmbeddingProviderKind::Local => Ok(Arc::new(HashingEmbedder::new())),
    }
}

/// Scale a vector to unit Euclidean norm in place
fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

// =============================================================================
// OpenAI Provider
// =============================================================================

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

/// Remote embedder calling the OpenAI embeddings API
///
/// Inputs are batched in groups of at most 100 per request; responses are
/// re-normalized so downstream cosine math never depends on the remote
/// model honoring unit norm.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(BACKEND_REQUEST_TIMEOUT_MS_DEFAULT))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        }
    }

    /// Point at a different API base (self-hosted gateways, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request_chunk(&self, chunk: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": chunk,
            "dimensions": self.dimensions,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::backend("embedding request failed", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::backend(
                "embedding request rejected",
                format!("status {status}: {detail}"),
            ));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::backend("embedding response unreadable", e.to_string()))?;

        if parsed.data.len() != chunk.len() {
            return Err(Error::backend(
                "embedding response incomplete",
                format!("sent {} inputs, got {} vectors", chunk.len(), parsed.data.len()),
            ));
        }

        // The API documents data[] as index-ordered; sort anyway.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let mut vector = item.embedding;
            l2_normalize(&mut vector);
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request_chunk(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::backend("embedding response incomplete", "no vector returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BACKEND_BATCH_SIZE_MAX) {
            all.extend(self.request_chunk(chunk).await?);
        }
        Ok(all)
    }
}

// =============================================================================
// Local Hashing Provider
// =============================================================================

/// Running vocabulary statistics for the hashing embedder
#[derive(Debug, Default)]
struct VocabularyStats {
    /// Total documents embedded so far
    document_count: u64,
    /// Per-token document frequency
    doc_frequency: HashMap<String, u64>,
}

/// Deterministic local embedder: hashing TF-IDF over a running vocabulary
///
/// 512 dimensions. Every `embed` call updates the document count and the
/// per-token document frequencies, so IDF sharpens as the corpus grows.
/// No model download, no network; suitable for air-gapped deployments and
/// used throughout the test suite.
pub struct HashingEmbedder {
    vocabulary: Mutex<VocabularyStats>,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self {
            vocabulary: Mutex::new(VocabularyStats::default()),
        }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }

    fn bucket(token: &str) -> usize {
        // DefaultHasher::new() is keyed identically for every instance, so
        // buckets are stable for the process lifetime.
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() % EMBEDDING_DIM_LOCAL as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM_LOCAL
    }

    fn model_name(&self) -> &str {
        "hashing-tfidf-512"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = Self::tokenize(text);

        let mut term_frequency: HashMap<&str, u64> = HashMap::new();
        for token in &tokens {
            *term_frequency.entry(token.as_str()).or_insert(0) += 1;
        }

        let mut vocabulary = self
            .vocabulary
            .lock()
            .map_err(|_| Error::internal("embedder vocabulary lock poisoned"))?;

        vocabulary.document_count += 1;
        for token in term_frequency.keys() {
            *vocabulary
                .doc_frequency
                .entry((*token).to_string())
                .or_insert(0) += 1;
        }

        let mut vector = vec![0.0f32; EMBEDDING_DIM_LOCAL];
        if !tokens.is_empty() {
            let document_count = vocabulary.document_count as f64;
            let token_total = tokens.len() as f64;

            for (token, count) in &term_frequency {
                let df = vocabulary.doc_frequency.get(*token).copied().unwrap_or(0) as f64;
                let idf = ((document_count + 1.0) / (df + 1.0)).ln() + 1.0;
                let tf = *count as f64 / token_total;
                vector[Self::bucket(token)] += (tf * idf) as f32;
            }
        }
        drop(vocabulary);

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

// =============================================================================
// Mock Provider (tests)
// =============================================================================

/// A simple mock embedder for testing
///
/// Each component is drawn from the std hasher over `(text, index)`, the
/// same hash family [`HashingEmbedder`] buckets with, so embeddings are
/// deterministic across runs. Not suitable for real semantic search.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    /// Create a new mock embedder with the specified dimension
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be positive");
        Self { dimension }
    }

    fn component(text: &str, index: usize) -> f32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        index.hash(&mut hasher);
        // Spread the 64-bit hash over [-1, 1].
        (hasher.finish() as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, value) in vector.iter_mut().enumerate() {
            *value = Self::component(text, i);
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}
