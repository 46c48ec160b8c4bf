//! Shared plumbing for the mnemo memory service
//!
//! TigerStyle: Explicit limits, explicit errors, no hidden configuration.
//!
//! This crate holds what every other mnemo crate needs and nothing more:
//!
//! - [`error`]: the engine-level error taxonomy
//! - [`redact`]: secret masking applied before errors cross the process boundary
//! - [`config`]: environment-driven configuration with validation
//! - [`constants`]: named limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod redact;

pub use config::{
    ConsolidationConfig, DecayConfig, EmbeddingProviderKind, LayerTtlConfig, MnemoConfig,
    OpenAiConfig, PineconeConfig, VectorStoreKind, WeaviateConfig,
};
pub use error::{Error, Result};
pub use redact::redact;
