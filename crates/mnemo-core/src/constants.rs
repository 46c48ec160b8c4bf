//! TigerStyle constants for mnemo
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Record Limits
// =============================================================================

/// Maximum length of record content in characters
pub const CONTENT_LENGTH_CHARS_MAX: usize = 10_000;

/// Maximum number of tags on a record
pub const TAGS_COUNT_MAX: usize = 50;

/// Maximum length of a single tag in characters
pub const TAG_LENGTH_CHARS_MAX: usize = 50;

/// Hard floor for record importance; decay never drops below this
pub const IMPORTANCE_MIN: f32 = 0.1;

/// Upper bound for record importance
pub const IMPORTANCE_MAX: f32 = 1.0;

/// Importance assigned when the caller supplies none
pub const IMPORTANCE_DEFAULT: f32 = 0.5;

/// Initial-layer threshold: importance at or above this starts in long-term
pub const IMPORTANCE_LONG_TERM_MIN: f32 = 0.8;

/// Initial-layer threshold: importance at or above this starts in short-term
pub const IMPORTANCE_SHORT_TERM_MIN: f32 = 0.5;

// =============================================================================
// Query Limits
// =============================================================================

/// Maximum length of a search query in characters
pub const QUERY_LENGTH_CHARS_MAX: usize = 1_000;

/// Maximum length of recall context in characters
pub const CONTEXT_LENGTH_CHARS_MAX: usize = 5_000;

/// Maximum length of a forget reason in characters
pub const REASON_LENGTH_CHARS_MAX: usize = 500;

/// Default number of search results
pub const SEARCH_LIMIT_DEFAULT: usize = 10;

/// Maximum number of search results per call
pub const SEARCH_LIMIT_MAX: usize = 100;

/// Maximum number of recall results per call
pub const RECALL_LIMIT_MAX: usize = 50;

/// Default number of list results
pub const LIST_LIMIT_DEFAULT: usize = 100;

/// Maximum number of records a list call returns
pub const LIST_LIMIT_MAX: usize = 1_000;

/// Search over-fetch multiplier applied before post-filtering
pub const SEARCH_OVERFETCH_FACTOR: usize = 2;

/// Characters of content returned as the preview in list results
pub const LIST_CONTENT_PREVIEW_CHARS: usize = 200;

// =============================================================================
// Backend Limits
// =============================================================================

/// Maximum records per batched store/embed request to a backend
pub const BACKEND_BATCH_SIZE_MAX: usize = 100;

/// Target capacity of the in-process working cache
pub const WORKING_CACHE_CAPACITY_DEFAULT: usize = 100;

/// HTTP request timeout for remote backends in milliseconds (30 sec)
pub const BACKEND_REQUEST_TIMEOUT_MS_DEFAULT: u64 = 30 * 1000;

// =============================================================================
// Embedding Dimensions
// =============================================================================

/// Dimension of the local hashing TF-IDF embedder
pub const EMBEDDING_DIM_LOCAL: usize = 512;

/// Default dimension for the OpenAI embedding provider
pub const EMBEDDING_DIM_OPENAI_DEFAULT: usize = 1536;

// =============================================================================
// Layer TTLs
// =============================================================================

/// Working-tier TTL in milliseconds (30 min)
pub const WORKING_MEMORY_TTL_MS_DEFAULT: u64 = 30 * 60 * 1000;

/// Short-term-tier TTL in milliseconds (7 days)
pub const SHORT_TERM_MEMORY_TTL_MS_DEFAULT: u64 = 7 * 24 * 60 * 60 * 1000;

/// Long-term-tier TTL in milliseconds (365 days)
pub const LONG_TERM_MEMORY_TTL_MS_DEFAULT: u64 = 365 * 24 * 60 * 60 * 1000;

// =============================================================================
// Maintenance
// =============================================================================

/// Short-term record count that triggers scheduled consolidation
pub const CONSOLIDATION_THRESHOLD_DEFAULT: usize = 100;

/// Age in milliseconds past which records are consolidation candidates (30 days)
pub const CONSOLIDATION_AGE_MS_DEFAULT: u64 = 30 * 24 * 60 * 60 * 1000;

/// Number of records retained un-consolidated per consolidation pass
pub const CONSOLIDATION_TARGET_SIZE_DEFAULT: usize = 50;

/// Maximum consolidation target size per call
pub const CONSOLIDATION_TARGET_SIZE_MAX: usize = 1_000;

/// Minimum group size eligible for consolidation; smaller groups are retained
pub const CONSOLIDATION_GROUP_SIZE_MIN: usize = 3;

/// Tags listed in a consolidated record's content header
pub const CONSOLIDATION_TOP_TAGS_COUNT: usize = 3;

/// Contents quoted in a consolidated record's summary line
pub const CONSOLIDATION_SUMMARY_ENTRIES_COUNT: usize = 3;

/// Exponential decay rate applied per 30-day period
pub const DECAY_RATE_DEFAULT: f64 = 0.1;

/// Interval between decay sweeps in milliseconds (1 day)
pub const DECAY_INTERVAL_MS_DEFAULT: u64 = 24 * 60 * 60 * 1000;

/// Interval between layer-rebalance sweeps in milliseconds (1 hour)
pub const REBALANCE_INTERVAL_MS_DEFAULT: u64 = 60 * 60 * 1000;

/// Interval between consolidation checks in milliseconds (6 hours)
pub const CONSOLIDATION_CHECK_INTERVAL_MS_DEFAULT: u64 = 6 * 60 * 60 * 1000;

/// Minimum record age in days before decay applies
pub const DECAY_AGE_DAYS_MIN: f64 = 1.0;

/// Memory score below which an expired record is demoted
pub const SCORE_DEMOTE_MAX: f64 = 0.3;

/// Memory score above which a record is promoted to long-term
pub const SCORE_PROMOTE_MIN: f64 = 0.8;

// Compile-time assertions for constant validity
const _: () = {
    assert!(IMPORTANCE_MIN > 0.0);
    assert!(SEARCH_LIMIT_DEFAULT <= SEARCH_LIMIT_MAX);
    assert!(LIST_LIMIT_DEFAULT <= LIST_LIMIT_MAX);
    assert!(WORKING_MEMORY_TTL_MS_DEFAULT < SHORT_TERM_MEMORY_TTL_MS_DEFAULT);
    assert!(SHORT_TERM_MEMORY_TTL_MS_DEFAULT < LONG_TERM_MEMORY_TTL_MS_DEFAULT);
    assert!(CONSOLIDATION_GROUP_SIZE_MIN >= 2);
    assert!(SEARCH_OVERFETCH_FACTOR >= 1);
};
