//! Hierarchical memory engine for mnemo
//!
//! TigerStyle: Three-tier memory with explicit layer transitions and a
//! coherent cache-over-store model.
//!
//! # Memory Tiers
//!
//! 1. **Working** - fresh, low-importance records; shortest TTL
//! 2. **Short-term** - medium-importance records; consolidation source
//! 3. **Long-term** - high-importance and consolidated records
//!
//! Records move between tiers automatically: scheduled decay lowers
//! importance over time, rebalancing demotes expired low-score records and
//! promotes high-score ones, and consolidation folds aged short-term groups
//! into single long-term summaries.
//!
//! # Capabilities
//!
//! The engine owns two capability traits picked once at startup:
//! [`Embedder`] (text to unit-norm vector) and [`VectorStore`] (persistence
//! and similarity search, with in-process, Weaviate, and Pinecone adapters).

mod cache;
mod embedder;
mod locks;
mod manager;
mod memory_store;
mod pinecone;
mod scheduler;
mod scoring;
mod store;
mod types;
mod weaviate;

pub use cache::WorkingCache;
pub use embedder::{build_embedder, Embedder, HashingEmbedder, MockEmbedder, OpenAiEmbedder};
pub use manager::{
    ConsolidateOptions, ConsolidationResult, ForgetOptions, ForgetResult, MemoryManager,
    RebalanceReport, RecallResult, SearchOptions, StoreOptions,
};
pub use memory_store::MemoryVectorStore;
pub use pinecone::PineconeVectorStore;
pub use scheduler::{MaintenanceScheduler, SchedulerConfig};
pub use scoring::{decay_factor, memory_score};
pub use store::{
    build_vector_store, cosine_similarity, relevance_from_cosine, ScoredRecord, SearchFilter,
    VectorStore,
};
pub use types::{
    now_ms, LayerCounts, MemoryId, MemoryLayer, MemoryRecord, MemorySource, MemoryStats,
};
pub use weaviate::WeaviateVectorStore;
