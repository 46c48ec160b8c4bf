//! Configuration for mnemo
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.
//!
//! All configuration is environment-driven (the service runs under a host
//! that owns the process); [`MnemoConfig::from_env`] reads the documented
//! variables and [`MnemoConfig::validate`] rejects combinations that could
//! not run. Validation failure is a fatal-init condition.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which vector store adapter backs the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// In-process map with linear-scan search (default, also used by tests)
    #[default]
    Memory,
    /// Self-hosted Weaviate instance
    Weaviate,
    /// Managed Pinecone index
    Pinecone,
}

impl FromStr for VectorStoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "weaviate" => Ok(Self::Weaviate),
            "pinecone" => Ok(Self::Pinecone),
            other => Err(Error::config(
                "VECTOR_STORE_TYPE",
                format!("unknown store '{other}', expected memory|weaviate|pinecone"),
            )),
        }
    }
}

/// Which embedding provider the engine uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Remote OpenAI embeddings API (default)
    #[default]
    OpenAi,
    /// Deterministic local hashing TF-IDF embedder
    Local,
}

impl FromStr for EmbeddingProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "local" => Ok(Self::Local),
            other => Err(Error::config(
                "EMBEDDING_PROVIDER",
                format!("unknown provider '{other}', expected openai|local"),
            )),
        }
    }
}

/// Per-tier retention TTLs in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerTtlConfig {
    pub working_ms: u64,
    pub short_term_ms: u64,
    pub long_term_ms: u64,
}

impl Default for LayerTtlConfig {
    fn default() -> Self {
        Self {
            working_ms: WORKING_MEMORY_TTL_MS_DEFAULT,
            short_term_ms: SHORT_TERM_MEMORY_TTL_MS_DEFAULT,
            long_term_ms: LONG_TERM_MEMORY_TTL_MS_DEFAULT,
        }
    }
}

/// Consolidation trigger tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Short-term record count that triggers a scheduled consolidation
    pub threshold: usize,
    /// Age past which a record is a consolidation candidate
    pub age_ms: u64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            threshold: CONSOLIDATION_THRESHOLD_DEFAULT,
            age_ms: CONSOLIDATION_AGE_MS_DEFAULT,
        }
    }
}

/// Importance decay tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Exponential rate applied per 30-day period
    pub rate: f64,
    /// Interval between decay sweeps
    pub interval_ms: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            rate: DECAY_RATE_DEFAULT,
            interval_ms: DECAY_INTERVAL_MS_DEFAULT,
        }
    }
}

/// OpenAI embedding provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Bearer credential; required when the provider is `openai`
    pub api_key: Option<String>,
    /// Embedding model name
    pub model: String,
    /// Requested embedding dimension
    pub dimensions: usize,
}

/// Weaviate adapter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeaviateConfig {
    /// Base URL of the instance; required when the store is `weaviate`
    pub url: Option<String>,
    /// Optional bearer credential
    pub api_key: Option<String>,
}

/// Pinecone adapter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// API credential; required when the store is `pinecone`
    pub api_key: Option<String>,
    /// Index host name
    pub index: String,
}

/// Main configuration for the mnemo service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnemoConfig {
    pub vector_store: VectorStoreKind,
    pub embedding_provider: EmbeddingProviderKind,
    pub layer_ttl: LayerTtlConfig,
    pub consolidation: ConsolidationConfig,
    pub decay: DecayConfig,
    pub openai: OpenAiConfig,
    pub weaviate: WeaviateConfig,
    pub pinecone: PineconeConfig,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            vector_store: VectorStoreKind::default(),
            embedding_provider: EmbeddingProviderKind::default(),
            layer_ttl: LayerTtlConfig::default(),
            consolidation: ConsolidationConfig::default(),
            decay: DecayConfig::default(),
            openai: OpenAiConfig {
                api_key: None,
                model: "text-embedding-3-small".to_string(),
                dimensions: EMBEDDING_DIM_OPENAI_DEFAULT,
            },
            weaviate: WeaviateConfig::default(),
            pinecone: PineconeConfig {
                api_key: None,
                index: "memory-mcp".to_string(),
            },
        }
    }
}

impl MnemoConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Keeps environment access out of the parsing logic so tests can feed a
    /// plain map instead of mutating process state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("VECTOR_STORE_TYPE") {
            config.vector_store = v.parse()?;
        }
        if let Some(v) = lookup("EMBEDDING_PROVIDER") {
            config.embedding_provider = v.parse()?;
        }

        config.layer_ttl.working_ms =
            parse_or("WORKING_MEMORY_TTL", &lookup, config.layer_ttl.working_ms)?;
        config.layer_ttl.short_term_ms = parse_or(
            "SHORT_TERM_MEMORY_TTL",
            &lookup,
            config.layer_ttl.short_term_ms,
        )?;
        config.layer_ttl.long_term_ms = parse_or(
            "LONG_TERM_MEMORY_TTL",
            &lookup,
            config.layer_ttl.long_term_ms,
        )?;

        config.consolidation.threshold = parse_or(
            "CONSOLIDATION_THRESHOLD",
            &lookup,
            config.consolidation.threshold,
        )?;
        config.consolidation.age_ms =
            parse_or("CONSOLIDATION_AGE", &lookup, config.consolidation.age_ms)?;

        config.decay.rate = parse_or("DECAY_RATE", &lookup, config.decay.rate)?;
        config.decay.interval_ms =
            parse_or("DECAY_INTERVAL", &lookup, config.decay.interval_ms)?;

        config.openai.api_key = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty());
        if let Some(v) = lookup("OPENAI_EMBEDDING_MODEL") {
            config.openai.model = v;
        }
        config.openai.dimensions = parse_or(
            "OPENAI_EMBEDDING_DIMENSIONS",
            &lookup,
            config.openai.dimensions,
        )?;

        config.weaviate.url = lookup("WEAVIATE_URL").filter(|v| !v.is_empty());
        config.weaviate.api_key = lookup("WEAVIATE_API_KEY").filter(|v| !v.is_empty());

        config.pinecone.api_key = lookup("PINECONE_API_KEY").filter(|v| !v.is_empty());
        if let Some(v) = lookup("PINECONE_INDEX") {
            config.pinecone.index = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.decay.rate < 0.0 {
            return Err(Error::config("DECAY_RATE", "must be non-negative"));
        }
        if self.decay.interval_ms == 0 {
            return Err(Error::config("DECAY_INTERVAL", "must be positive"));
        }
        if self.consolidation.threshold == 0 {
            return Err(Error::config("CONSOLIDATION_THRESHOLD", "must be positive"));
        }
        if self.layer_ttl.working_ms >= self.layer_ttl.short_term_ms
            || self.layer_ttl.short_term_ms >= self.layer_ttl.long_term_ms
        {
            return Err(Error::config(
                "WORKING_MEMORY_TTL",
                "layer TTLs must be strictly increasing: working < short-term < long-term",
            ));
        }
        if self.openai.dimensions == 0 {
            return Err(Error::config("OPENAI_EMBEDDING_DIMENSIONS", "must be positive"));
        }

        // Credentials are startup requirements only for the selected backends.
        if self.embedding_provider == EmbeddingProviderKind::OpenAi
            && self.openai.api_key.is_none()
        {
            return Err(Error::config(
                "OPENAI_API_KEY",
                "required when EMBEDDING_PROVIDER=openai",
            ));
        }
        if self.vector_store == VectorStoreKind::Weaviate && self.weaviate.url.is_none() {
            return Err(Error::config(
                "WEAVIATE_URL",
                "required when VECTOR_STORE_TYPE=weaviate",
            ));
        }
        if self.vector_store == VectorStoreKind::Pinecone && self.pinecone.api_key.is_none() {
            return Err(Error::config(
                "PINECONE_API_KEY",
                "required when VECTOR_STORE_TYPE=pinecone",
            ));
        }

        Ok(())
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| {
            Error::config(key.to_string(), format!("unparseable value '{raw}': {e}"))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_default_config_is_valid() {
        // Defaults select the local-friendly backends implicitly only when
        // the env says so; the bare default (openai, no key) must fail.
        let config = MnemoConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_stack_needs_no_credentials() {
        let config = MnemoConfig::from_lookup(lookup_from(&[
            ("VECTOR_STORE_TYPE", "memory"),
            ("EMBEDDING_PROVIDER", "local"),
        ]))
        .unwrap();
        assert_eq!(config.vector_store, VectorStoreKind::Memory);
        assert_eq!(config.embedding_provider, EmbeddingProviderKind::Local);
    }

    #[test]
    fn test_openai_requires_api_key() {
        let err = MnemoConfig::from_lookup(lookup_from(&[
            ("VECTOR_STORE_TYPE", "memory"),
            ("EMBEDDING_PROVIDER", "openai"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_weaviate_requires_url() {
        let err = MnemoConfig::from_lookup(lookup_from(&[
            ("VECTOR_STORE_TYPE", "weaviate"),
            ("EMBEDDING_PROVIDER", "local"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("WEAVIATE_URL"));
    }

    #[test]
    fn test_env_overrides() {
        let config = MnemoConfig::from_lookup(lookup_from(&[
            ("VECTOR_STORE_TYPE", "pinecone"),
            ("EMBEDDING_PROVIDER", "local"),
            ("PINECONE_API_KEY", "pc-test"),
            ("PINECONE_INDEX", "memories-prod"),
            ("DECAY_RATE", "0.25"),
            ("CONSOLIDATION_THRESHOLD", "40"),
        ]))
        .unwrap();

        assert_eq!(config.vector_store, VectorStoreKind::Pinecone);
        assert_eq!(config.pinecone.index, "memories-prod");
        assert_eq!(config.decay.rate, 0.25);
        assert_eq!(config.consolidation.threshold, 40);
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let err = MnemoConfig::from_lookup(lookup_from(&[
            ("EMBEDDING_PROVIDER", "local"),
            ("DECAY_INTERVAL", "one-day"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DECAY_INTERVAL"));
    }

    #[test]
    fn test_ttl_ordering_enforced() {
        let err = MnemoConfig::from_lookup(lookup_from(&[
            ("EMBEDDING_PROVIDER", "local"),
            ("WORKING_MEMORY_TTL", "999999999999"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_unknown_store_kind_is_rejected() {
        let err = MnemoConfig::from_lookup(lookup_from(&[("VECTOR_STORE_TYPE", "chroma")]))
            .unwrap_err();
        assert!(err.to_string().contains("chroma"));
    }
}
