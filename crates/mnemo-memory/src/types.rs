//! Record types for the memory engine
//!
//! TigerStyle: Explicit types with clear semantics; timestamps are integer
//! milliseconds since epoch for wire compatibility.

use chrono::Utc;
use mnemo_core::constants::{IMPORTANCE_MAX, IMPORTANCE_MIN};
use mnemo_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Returns the current time in milliseconds since epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Opaque unique record identifier
///
/// Random 128-bit, never reused; string form on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(Uuid);

impl MemoryId {
    /// Allocate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MemoryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::validation("memoryId", format!("not a valid id: {e}")))
    }
}

/// Retention tier of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryLayer {
    #[serde(rename = "working")]
    Working,
    #[serde(rename = "short-term")]
    ShortTerm,
    #[serde(rename = "long-term")]
    LongTerm,
}

impl MemoryLayer {
    /// All layers, lowest tier first
    pub const ALL: [MemoryLayer; 3] = [Self::Working, Self::ShortTerm, Self::LongTerm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::ShortTerm => "short-term",
            Self::LongTerm => "long-term",
        }
    }

    /// The tier a record demotes into, if one exists
    pub fn next_lower(&self) -> Option<MemoryLayer> {
        match self {
            Self::Working => None,
            Self::ShortTerm => Some(Self::Working),
            Self::LongTerm => Some(Self::ShortTerm),
        }
    }
}

impl fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryLayer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "working" => Ok(Self::Working),
            "short-term" => Ok(Self::ShortTerm),
            "long-term" => Ok(Self::LongTerm),
            other => Err(Error::validation(
                "layer",
                format!("unknown layer '{other}', expected working|short-term|long-term"),
            )),
        }
    }
}

/// Provenance of a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    User,
    #[default]
    Agent,
    System,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemorySource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            other => Err(Error::validation(
                "source",
                format!("unknown source '{other}', expected user|agent|system"),
            )),
        }
    }
}

/// Clamp an importance value into the engine's hard bounds
pub(crate) fn clamp_importance(value: f32) -> f32 {
    value.clamp(IMPORTANCE_MIN, IMPORTANCE_MAX)
}

/// One unit of stored knowledge
///
/// Invariants held by every constructor and mutator:
/// - `importance` stays within `[0.1, 1.0]`
/// - `last_accessed >= timestamp`
/// - `embedding`, when present, is unit-norm with the provider's dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub content: String,
    /// Absent only on records retrieved without vector projection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Creation time in ms since epoch; immutable
    pub timestamp: i64,
    pub importance: f32,
    pub source: MemorySource,
    pub tags: Vec<String>,
    pub access_count: u64,
    pub last_accessed: i64,
    pub layer: MemoryLayer,
}

impl MemoryRecord {
    /// Create a record at the current time with a fresh id
    pub fn new(
        content: impl Into<String>,
        importance: f32,
        source: MemorySource,
        tags: Vec<String>,
        layer: MemoryLayer,
    ) -> Self {
        let now = now_ms();
        Self {
            id: MemoryId::new(),
            content: content.into(),
            embedding: None,
            timestamp: now,
            importance: clamp_importance(importance),
            source,
            tags,
            access_count: 0,
            last_accessed: now,
            layer,
        }
    }

    /// Record a successful retrieval
    pub fn record_access(&mut self, now: i64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now.max(self.timestamp);
    }

    /// Set importance, clamped into the hard bounds
    pub fn set_importance(&mut self, importance: f32) {
        self.importance = clamp_importance(importance);
    }

    /// Age in milliseconds at `now`
    pub fn age_ms(&self, now: i64) -> i64 {
        (now - self.timestamp).max(0)
    }

    /// Age in fractional days at `now`
    pub fn age_days(&self, now: i64) -> f64 {
        self.age_ms(now) as f64 / 86_400_000.0
    }
}

/// Per-layer record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCounts {
    #[serde(rename = "working")]
    pub working: usize,
    #[serde(rename = "short-term")]
    pub short_term: usize,
    #[serde(rename = "long-term")]
    pub long_term: usize,
}

impl LayerCounts {
    /// Count a record in its layer
    pub fn add(&mut self, layer: MemoryLayer) {
        match layer {
            MemoryLayer::Working => self.working += 1,
            MemoryLayer::ShortTerm => self.short_term += 1,
            MemoryLayer::LongTerm => self.long_term += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.working + self.short_term + self.long_term
    }
}

/// Aggregate statistics over the stored corpus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_memories: usize,
    pub by_layer: LayerCounts,
    pub avg_importance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_memory: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_id_roundtrip() {
        let id = MemoryId::new();
        let parsed: MemoryId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_memory_id_uniqueness() {
        let a = MemoryId::new();
        let b = MemoryId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_layer_serde_names() {
        assert_eq!(
            serde_json::to_string(&MemoryLayer::ShortTerm).unwrap(),
            "\"short-term\""
        );
        let layer: MemoryLayer = serde_json::from_str("\"long-term\"").unwrap();
        assert_eq!(layer, MemoryLayer::LongTerm);
    }

    #[test]
    fn test_layer_next_lower() {
        assert_eq!(MemoryLayer::Working.next_lower(), None);
        assert_eq!(
            MemoryLayer::ShortTerm.next_lower(),
            Some(MemoryLayer::Working)
        );
        assert_eq!(
            MemoryLayer::LongTerm.next_lower(),
            Some(MemoryLayer::ShortTerm)
        );
    }

    #[test]
    fn test_record_importance_clamped() {
        let record = MemoryRecord::new(
            "note",
            0.0,
            MemorySource::Agent,
            vec![],
            MemoryLayer::Working,
        );
        assert_eq!(record.importance, IMPORTANCE_MIN);

        let mut record = record;
        record.set_importance(7.5);
        assert_eq!(record.importance, IMPORTANCE_MAX);
    }

    #[test]
    fn test_record_access_monotone() {
        let mut record = MemoryRecord::new(
            "note",
            0.5,
            MemorySource::User,
            vec![],
            MemoryLayer::Working,
        );
        let before = record.last_accessed;
        record.record_access(before + 1_000);

        assert_eq!(record.access_count, 1);
        assert_eq!(record.last_accessed, before + 1_000);
        assert!(record.last_accessed >= record.timestamp);
    }

    #[test]
    fn test_record_access_never_precedes_creation() {
        let mut record = MemoryRecord::new(
            "note",
            0.5,
            MemorySource::User,
            vec![],
            MemoryLayer::Working,
        );
        record.record_access(record.timestamp - 5_000);
        assert_eq!(record.last_accessed, record.timestamp);
    }

    #[test]
    fn test_record_wire_shape_is_camel_case() {
        let record = MemoryRecord::new(
            "note",
            0.5,
            MemorySource::Agent,
            vec!["alpha".into()],
            MemoryLayer::ShortTerm,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("accessCount").is_some());
        assert!(value.get("lastAccessed").is_some());
        assert_eq!(value["layer"], "short-term");
        // No embedding was set, so the field must be absent entirely.
        assert!(value.get("embedding").is_none());
    }

    #[test]
    fn test_layer_counts() {
        let mut counts = LayerCounts::default();
        counts.add(MemoryLayer::Working);
        counts.add(MemoryLayer::LongTerm);
        counts.add(MemoryLayer::LongTerm);
        assert_eq!(counts.working, 1);
        assert_eq!(counts.long_term, 2);
        assert_eq!(counts.total(), 3);
    }
}
