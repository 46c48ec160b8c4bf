//! Memory manager: the engine's domain operations
//!
//! TigerStyle: One owning composition, per-id critical sections, no hidden
//! state beyond the cache and the lock table.
//!
//! The manager owns the [`VectorStore`] and [`Embedder`] capabilities and is
//! the only mutator. Every per-record write happens inside that record's
//! critical section, with the working cache updated in lock-step with the
//! store so readers never observe a mixed state. Access-counter writes from
//! search and recall are best-effort: failures log and the search result
//! still returns.

use crate::cache::WorkingCache;
use crate::embedder::Embedder;
use crate::locks::IdLockTable;
use crate::scoring::{decay_factor, memory_score};
use crate::store::{ScoredRecord, SearchFilter, VectorStore};
use crate::types::{
    now_ms, LayerCounts, MemoryId, MemoryLayer, MemoryRecord, MemorySource, MemoryStats,
};
use chrono::TimeZone;
use mnemo_core::config::{ConsolidationConfig, DecayConfig, LayerTtlConfig, MnemoConfig};
use mnemo_core::constants::{
    CONSOLIDATION_GROUP_SIZE_MIN, CONSOLIDATION_SUMMARY_ENTRIES_COUNT,
    CONSOLIDATION_TARGET_SIZE_DEFAULT, CONSOLIDATION_TOP_TAGS_COUNT, DECAY_AGE_DAYS_MIN,
    IMPORTANCE_DEFAULT, IMPORTANCE_LONG_TERM_MIN, IMPORTANCE_SHORT_TERM_MIN, IMPORTANCE_MIN,
    SCORE_DEMOTE_MAX, SCORE_PROMOTE_MIN, SEARCH_LIMIT_DEFAULT, SEARCH_OVERFETCH_FACTOR,
};
use mnemo_core::error::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Options for [`MemoryManager::store`]
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Importance in `[0, 1]`; defaults to 0.5
    pub importance: Option<f32>,
    pub tags: Vec<String>,
    pub source: MemorySource,
    /// Explicit layer; otherwise chosen from importance
    pub layer: Option<MemoryLayer>,
}

/// Options for [`MemoryManager::search`]
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Layers to search; empty means all
    pub layer_filter: Vec<MemoryLayer>,
    /// Require every listed tag
    pub tags: Option<Vec<String>>,
    /// Drop results scoring below this relevance
    pub min_relevance: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: SEARCH_LIMIT_DEFAULT,
            layer_filter: Vec::new(),
            tags: None,
            min_relevance: 0.0,
        }
    }
}

/// Result of [`MemoryManager::recall`]
#[derive(Debug)]
pub struct RecallResult {
    pub memories: Vec<ScoredRecord>,
    /// One-line count-by-layer digest
    pub summary: String,
}

/// Options for [`MemoryManager::consolidate`]
#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    /// Candidate cutoff; defaults to now minus the configured age
    pub older_than: Option<i64>,
    /// Records retained un-consolidated
    pub target_size: usize,
    /// Tier to consolidate
    pub layer: MemoryLayer,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            older_than: None,
            target_size: CONSOLIDATION_TARGET_SIZE_DEFAULT,
            layer: MemoryLayer::ShortTerm,
        }
    }
}

/// Result of [`MemoryManager::consolidate`]
#[derive(Debug, Default)]
pub struct ConsolidationResult {
    pub consolidated: Vec<MemoryRecord>,
    pub deleted: Vec<MemoryId>,
    pub summary: String,
}

/// Options for [`MemoryManager::forget`]
///
/// At least one of `memory_id`, `older_than`, `layer` must be set; the
/// boundary enforces that before the engine is called.
#[derive(Debug, Clone, Default)]
pub struct ForgetOptions {
    pub memory_id: Option<MemoryId>,
    pub older_than: Option<i64>,
    pub layer: Option<MemoryLayer>,
    pub reason: Option<String>,
}

/// Result of [`MemoryManager::forget`]
#[derive(Debug, Default)]
pub struct ForgetResult {
    pub deleted: Vec<MemoryId>,
    pub reason: String,
}

/// Counters from a rebalance sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    pub promoted: usize,
    pub demoted: usize,
    pub attenuated: usize,
}

/// Domain operations over the memory corpus
pub struct MemoryManager {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    cache: RwLock<WorkingCache>,
    locks: IdLockTable,
    layer_ttl: LayerTtlConfig,
    consolidation: ConsolidationConfig,
    decay: DecayConfig,
    /// Age in days already decayed per record, so repeated sweeps within the
    /// same instant apply no additional decay
    decay_marks: StdMutex<HashMap<MemoryId, f64>>,
}

impl MemoryManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &MnemoConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            cache: RwLock::new(WorkingCache::new()),
            locks: IdLockTable::new(),
            layer_ttl: config.layer_ttl.clone(),
            consolidation: config.consolidation.clone(),
            decay: config.decay.clone(),
            decay_marks: StdMutex::new(HashMap::new()),
        }
    }

    /// Ensure backend schema exists and warm the cache from the store
    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize().await?;

        let records = self.store.list(None).await?;
        let count = records.len();
        self.cache.write().await.warm(records, now_ms());

        info!(records = count, "memory manager initialized");
        Ok(())
    }

    fn ttl_ms(&self, layer: MemoryLayer) -> u64 {
        match layer {
            MemoryLayer::Working => self.layer_ttl.working_ms,
            MemoryLayer::ShortTerm => self.layer_ttl.short_term_ms,
            MemoryLayer::LongTerm => self.layer_ttl.long_term_ms,
        }
    }

    fn initial_layer(importance: f32) -> MemoryLayer {
        if importance >= IMPORTANCE_LONG_TERM_MIN {
            MemoryLayer::LongTerm
        } else if importance >= IMPORTANCE_SHORT_TERM_MIN {
            MemoryLayer::ShortTerm
        } else {
            MemoryLayer::Working
        }
    }

    /// Store a new record
    ///
    /// The cache insert happens strictly after the store write succeeds, so
    /// a cancelled or failed store never leaves a cache-only record.
    pub async fn store(&self, content: &str, options: StoreOptions) -> Result<MemoryRecord> {
        let importance = options.importance.unwrap_or(IMPORTANCE_DEFAULT);
        let layer = options
            .layer
            .unwrap_or_else(|| Self::initial_layer(importance));

        let vector = self.embedder.embed(content).await?;

        let mut record =
            MemoryRecord::new(content, importance, options.source, options.tags, layer);
        record.embedding = Some(vector);

        let _guard = self.locks.lock(&record.id).await;
        self.store.store(&record).await?;
        self.cache.write().await.insert(record.clone());

        debug!(id = %record.id, layer = %record.layer, "stored memory");
        Ok(record)
    }

    /// Semantic search over the corpus
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<ScoredRecord>> {
        let vector = self.embedder.embed(query).await?;

        // Single-layer filters ride to the backend; multi-layer filters are
        // honored here after over-fetch, never reduced to their first entry.
        let backend_layer = match options.layer_filter.as_slice() {
            [single] => Some(*single),
            _ => None,
        };
        let filter = SearchFilter {
            layer: backend_layer,
            tags: options.tags.clone(),
            min_importance: None,
        };

        let fetch_k = options.limit * SEARCH_OVERFETCH_FACTOR;
        let hits = self
            .store
            .search(&vector, fetch_k, Some(&filter))
            .await?;

        let survivors: Vec<ScoredRecord> = hits
            .into_iter()
            .filter(|hit| hit.relevance >= options.min_relevance)
            .filter(|hit| {
                options.layer_filter.len() <= 1
                    || options.layer_filter.contains(&hit.record.layer)
            })
            .collect();

        let mut results = Vec::with_capacity(survivors.len());
        for hit in survivors {
            let record = self.bump_access(hit.record).await;
            results.push(ScoredRecord {
                record,
                relevance: hit.relevance,
            });
        }

        results.truncate(options.limit);
        Ok(results)
    }

    /// Best-effort access-counter bump inside the record's critical section
    async fn bump_access(&self, record: MemoryRecord) -> MemoryRecord {
        let now = now_ms();
        let _guard = self.locks.lock(&record.id).await;

        let fresh = match self.store.get(&record.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => return record,
            Err(e) => {
                warn!(id = %record.id, error = %e, "access-count re-read failed");
                return record;
            }
        };

        let mut updated = fresh;
        updated.record_access(now);

        if let Err(e) = self.store.update(&updated).await {
            warn!(id = %record.id, error = %e, "access-count update failed");
            return record;
        }
        self.cache.write().await.update(&updated);
        updated
    }

    /// Task-oriented recall across all layers
    pub async fn recall(
        &self,
        task: &str,
        context: Option<&str>,
        limit: usize,
    ) -> Result<RecallResult> {
        let query = match context {
            Some(context) => format!("{task}\n\nContext: {context}"),
            None => task.to_string(),
        };

        let options = SearchOptions {
            limit,
            layer_filter: MemoryLayer::ALL.to_vec(),
            ..Default::default()
        };
        let memories = self.search(&query, &options).await?;

        let mut counts = LayerCounts::default();
        for hit in &memories {
            counts.add(hit.record.layer);
        }
        let summary = format!(
            "Recalled {} memories ({} working, {} short-term, {} long-term)",
            memories.len(),
            counts.working,
            counts.short_term,
            counts.long_term
        );

        Ok(RecallResult { memories, summary })
    }

    /// Fold aged records into consolidated long-term summaries
    pub async fn consolidate(&self, options: &ConsolidateOptions) -> Result<ConsolidationResult> {
        let now = now_ms();
        let older_than = options
            .older_than
            .unwrap_or(now - self.consolidation.age_ms as i64);

        let filter = SearchFilter {
            layer: Some(options.layer),
            ..Default::default()
        };
        let mut candidates: Vec<MemoryRecord> = self
            .store
            .list(Some(&filter))
            .await?
            .into_iter()
            .filter(|r| r.timestamp < older_than)
            .collect();

        if candidates.len() < options.target_size {
            return Ok(ConsolidationResult {
                summary: format!(
                    "Nothing to consolidate: {} candidates in {} older than cutoff, below target size {}",
                    candidates.len(),
                    options.layer,
                    options.target_size
                ),
                ..Default::default()
            });
        }

        // Highest-scoring records survive as-is; the rest consolidate.
        candidates.sort_by(|a, b| {
            memory_score(b, now, self.decay.rate)
                .partial_cmp(&memory_score(a, now, self.decay.rate))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let consolidation_set = candidates.split_off(options.target_size);

        let mut groups: BTreeMap<String, Vec<MemoryRecord>> = BTreeMap::new();
        for record in consolidation_set {
            let primary = record
                .tags
                .first()
                .cloned()
                .unwrap_or_else(|| "uncategorized".to_string());
            groups.entry(primary).or_default().push(record);
        }

        let mut result = ConsolidationResult::default();
        let mut folded_count = 0usize;
        for (primary_tag, mut group) in groups {
            if group.len() < CONSOLIDATION_GROUP_SIZE_MIN {
                // Too small to summarize; the group stays as-is.
                continue;
            }
            group.sort_by_key(|r| r.timestamp);

            let content = Self::consolidated_content(&primary_tag, &group);
            let importance = (group.iter().map(|r| r.importance).sum::<f32>()
                / group.len() as f32)
                * 0.9;
            let tags = Self::consolidated_tags(&primary_tag, &group);

            let consolidated = self
                .store(
                    &content,
                    StoreOptions {
                        importance: Some(importance),
                        tags,
                        source: MemorySource::System,
                        layer: Some(MemoryLayer::LongTerm),
                    },
                )
                .await?;
            result.consolidated.push(consolidated);

            for record in &group {
                let _guard = self.locks.lock(&record.id).await;
                if self.store.delete(&record.id).await? {
                    self.cache.write().await.remove(&record.id);
                    self.forget_decay_mark(&record.id);
                    result.deleted.push(record.id);
                }
            }
            folded_count += group.len();
        }

        result.summary = if result.consolidated.is_empty() {
            format!(
                "No tag group reached {} records; nothing consolidated",
                CONSOLIDATION_GROUP_SIZE_MIN
            )
        } else {
            format!(
                "Consolidated {} memories into {} long-term records",
                folded_count,
                result.consolidated.len()
            )
        };

        info!(
            deleted = result.deleted.len(),
            created = result.consolidated.len(),
            layer = %options.layer,
            "consolidation pass complete"
        );
        Ok(result)
    }

    fn consolidated_content(primary_tag: &str, group: &[MemoryRecord]) -> String {
        let format_day = |ms: i64| {
            chrono::Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| ms.to_string())
        };
        let start = format_day(group.first().map(|r| r.timestamp).unwrap_or_default());
        let end = format_day(group.last().map(|r| r.timestamp).unwrap_or_default());

        let mut tag_counts: HashMap<&str, usize> = HashMap::new();
        for record in group {
            for tag in &record.tags {
                *tag_counts.entry(tag.as_str()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(&str, usize)> = tag_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        let top_tags: Vec<&str> = ranked
            .iter()
            .take(CONSOLIDATION_TOP_TAGS_COUNT)
            .map(|(tag, _)| *tag)
            .collect();
        let tags_line = if top_tags.is_empty() {
            primary_tag.to_string()
        } else {
            top_tags.join(", ")
        };

        let mut summary = group
            .iter()
            .take(CONSOLIDATION_SUMMARY_ENTRIES_COUNT)
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join(" | ");
        if group.len() > CONSOLIDATION_SUMMARY_ENTRIES_COUNT {
            summary.push_str("[...]");
        }

        format!(
            "[Consolidated Memory: {} entries from {} to {}]\nTags: {}\nSummary: {}",
            group.len(),
            start,
            end,
            tags_line,
            summary
        )
    }

    fn consolidated_tags(primary_tag: &str, group: &[MemoryRecord]) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let mut push_unique = |tag: &str, tags: &mut Vec<String>| {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        };
        for record in group {
            for tag in &record.tags {
                push_unique(tag, &mut tags);
            }
        }
        push_unique(primary_tag, &mut tags);
        push_unique("consolidated", &mut tags);
        tags
    }

    /// Delete records by id, age, or layer
    pub async fn forget(&self, options: &ForgetOptions) -> Result<ForgetResult> {
        let mut result = ForgetResult::default();
        let mut reasons: Vec<String> = Vec::new();

        if let Some(id) = options.memory_id {
            let _guard = self.locks.lock(&id).await;
            if self.store.delete(&id).await? {
                self.cache.write().await.remove(&id);
                self.forget_decay_mark(&id);
                result.deleted.push(id);
                reasons.push(
                    options
                        .reason
                        .clone()
                        .unwrap_or_else(|| "Explicit deletion".to_string()),
                );
            }
        }

        if options.older_than.is_some() || options.layer.is_some() {
            let filter = options.layer.map(|layer| SearchFilter {
                layer: Some(layer),
                ..Default::default()
            });
            let listed = self.store.list(filter.as_ref()).await?;

            let victims: Vec<MemoryId> = listed
                .iter()
                .filter(|r| options.older_than.map_or(true, |t| r.timestamp < t))
                .map(|r| r.id)
                .collect();

            let mut swept = 0usize;
            for id in victims {
                let _guard = self.locks.lock(&id).await;
                if self.store.delete(&id).await? {
                    self.cache.write().await.remove(&id);
                    self.forget_decay_mark(&id);
                    result.deleted.push(id);
                    swept += 1;
                }
            }

            if let Some(custom) = options.reason.clone().filter(|_| options.memory_id.is_none()) {
                reasons.push(custom);
            }
            reasons.push(match (options.older_than, options.layer) {
                (Some(cutoff), Some(layer)) => {
                    format!("Deleted {swept} memories in {layer} older than {cutoff}")
                }
                (Some(cutoff), None) => format!("Deleted {swept} memories older than {cutoff}"),
                (None, Some(layer)) => format!("Cleared {swept} memories from {layer}"),
                (None, None) => unreachable!("guarded by the surrounding if"),
            });
        }

        result.reason = if reasons.is_empty() {
            "No matching memories".to_string()
        } else {
            reasons.join("; ")
        };

        debug!(deleted = result.deleted.len(), "forget complete");
        Ok(result)
    }

    fn forget_decay_mark(&self, id: &MemoryId) {
        if let Ok(mut marks) = self.decay_marks.lock() {
            marks.remove(id);
        }
    }

    /// Scheduled importance decay
    ///
    /// Decays each record for the age it has accrued since its last decay,
    /// so the sweep composes to `exp(-rate * age_days / 30)` overall and a
    /// repeat call at the same instant changes nothing. Only records at
    /// least one day old decay; importance never drops below the floor.
    pub async fn apply_decay(&self) -> Result<usize> {
        let now = now_ms();
        let records = self.store.list(None).await?;

        let mut decayed = 0usize;
        for record in records {
            let age_days = record.age_days(now);
            if age_days < DECAY_AGE_DAYS_MIN {
                continue;
            }

            let already_applied = self
                .decay_marks
                .lock()
                .ok()
                .and_then(|marks| marks.get(&record.id).copied())
                .unwrap_or(0.0);
            let delta_days = age_days - already_applied;
            if delta_days <= f64::EPSILON {
                continue;
            }

            let _guard = self.locks.lock(&record.id).await;
            let mut fresh = match self.store.get(&record.id).await {
                Ok(Some(fresh)) => fresh,
                Ok(None) => {
                    self.forget_decay_mark(&record.id);
                    continue;
                }
                Err(e) => {
                    warn!(id = %record.id, error = %e, "decay re-read failed");
                    continue;
                }
            };

            let factor = decay_factor(delta_days, self.decay.rate);
            let next =
                ((fresh.importance as f64 * factor).max(IMPORTANCE_MIN as f64)) as f32;
            if (next - fresh.importance).abs() > f32::EPSILON {
                fresh.set_importance(next);
                if let Err(e) = self.store.update(&fresh).await {
                    warn!(id = %fresh.id, error = %e, "decay update failed");
                    continue;
                }
                self.cache.write().await.update(&fresh);
                decayed += 1;
            }

            if let Ok(mut marks) = self.decay_marks.lock() {
                marks.insert(record.id, age_days);
            }
        }

        debug!(decayed, "decay sweep complete");
        Ok(decayed)
    }

    /// Scheduled layer migration
    ///
    /// Past-TTL records with a low score demote one tier (long-term instead
    /// attenuates importance and stays); high-score records promote straight
    /// to long-term.
    pub async fn rebalance_layers(&self) -> Result<RebalanceReport> {
        let now = now_ms();
        let records = self.store.list(None).await?;

        let mut report = RebalanceReport::default();
        for record in records {
            let _guard = self.locks.lock(&record.id).await;
            let mut fresh = match self.store.get(&record.id).await {
                Ok(Some(fresh)) => fresh,
                Ok(None) => continue,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "rebalance re-read failed");
                    continue;
                }
            };

            let score = memory_score(&fresh, now, self.decay.rate);
            let expired = fresh.age_ms(now) as u64 > self.ttl_ms(fresh.layer);

            let change = if expired && score < SCORE_DEMOTE_MAX {
                match fresh.layer {
                    MemoryLayer::LongTerm => {
                        fresh.set_importance(fresh.importance * 0.5);
                        report.attenuated += 1;
                        true
                    }
                    layer => match layer.next_lower() {
                        Some(lower) => {
                            fresh.layer = lower;
                            report.demoted += 1;
                            true
                        }
                        None => false,
                    },
                }
            } else if score > SCORE_PROMOTE_MIN && fresh.layer != MemoryLayer::LongTerm {
                fresh.layer = MemoryLayer::LongTerm;
                report.promoted += 1;
                true
            } else {
                false
            };

            if change {
                if let Err(e) = self.store.update(&fresh).await {
                    warn!(id = %fresh.id, error = %e, "rebalance update failed");
                    continue;
                }
                self.cache.write().await.update(&fresh);
            }
        }

        debug!(?report, "rebalance sweep complete");
        Ok(report)
    }

    /// List records for the gateway
    pub async fn list(
        &self,
        layer: Option<MemoryLayer>,
        tags: Option<Vec<String>>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let filter = SearchFilter {
            layer,
            tags,
            min_importance: None,
        };
        let mut records = self.store.list(Some(&filter)).await?;
        records.truncate(limit);
        Ok(records)
    }

    /// Fetch one record by id
    pub async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        self.store.get(id).await
    }

    /// Corpus statistics from a listing
    pub async fn stats(&self) -> Result<MemoryStats> {
        let records = self.store.list(None).await?;

        let mut stats = MemoryStats {
            total_memories: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            return Ok(stats);
        }

        let mut importance_sum = 0.0f64;
        for record in &records {
            stats.by_layer.add(record.layer);
            importance_sum += record.importance as f64;
            stats.oldest_memory = Some(
                stats
                    .oldest_memory
                    .map_or(record.timestamp, |v| v.min(record.timestamp)),
            );
            stats.newest_memory = Some(
                stats
                    .newest_memory
                    .map_or(record.timestamp, |v| v.max(record.timestamp)),
            );
        }
        stats.avg_importance = (importance_sum / records.len() as f64) as f32;
        Ok(stats)
    }

    /// Number of records currently in a layer
    pub async fn count_layer(&self, layer: MemoryLayer) -> Result<usize> {
        let filter = SearchFilter {
            layer: Some(layer),
            ..Default::default()
        };
        Ok(self.store.list(Some(&filter)).await?.len())
    }

    /// Count that triggers scheduled consolidation
    pub fn consolidation_threshold(&self) -> usize {
        self.consolidation.threshold
    }

    /// Number of cached records (tests and diagnostics)
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Release backend resources
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}
