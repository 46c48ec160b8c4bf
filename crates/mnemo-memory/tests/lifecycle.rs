//! End-to-end lifecycle tests over the full engine
//!
//! Runs the manager against the in-process store and the deterministic
//! local embedder, exercising the complete record lifecycle: store, search,
//! recall, consolidate, forget, decay, rebalance. Ages are injected by
//! rewriting timestamps directly through the store.

use mnemo_core::config::{EmbeddingProviderKind, MnemoConfig};
use mnemo_memory::{
    ConsolidateOptions, ForgetOptions, HashingEmbedder, MemoryLayer, MemoryManager, MemoryRecord,
    MemorySource, MemoryVectorStore, SearchOptions, StoreOptions, VectorStore, now_ms,
};
use std::sync::Arc;

const DAY_MS: i64 = 86_400_000;

fn engine() -> (Arc<MemoryManager>, Arc<MemoryVectorStore>) {
    let mut config = MnemoConfig::default();
    config.embedding_provider = EmbeddingProviderKind::Local;

    let store = Arc::new(MemoryVectorStore::new());
    let embedder = Arc::new(HashingEmbedder::new());
    let manager = Arc::new(MemoryManager::new(store.clone(), embedder, &config));
    (manager, store)
}

/// Rewrite a record's creation time, as if it had been stored days ago.
async fn backdate(store: &MemoryVectorStore, record: &MemoryRecord, days: i64) -> MemoryRecord {
    let mut aged = record.clone();
    aged.timestamp -= days * DAY_MS;
    aged.last_accessed = aged.timestamp;
    store.update(&aged).await.unwrap();
    aged
}

#[tokio::test]
async fn initial_layer_mapping() {
    let (manager, _) = engine();

    let by_importance = |importance: f32| StoreOptions {
        importance: Some(importance),
        ..Default::default()
    };

    let a = manager.store("A", by_importance(0.3)).await.unwrap();
    let b = manager.store("B", by_importance(0.6)).await.unwrap();
    let c = manager.store("C", by_importance(0.9)).await.unwrap();

    assert_eq!(a.layer, MemoryLayer::Working);
    assert_eq!(b.layer, MemoryLayer::ShortTerm);
    assert_eq!(c.layer, MemoryLayer::LongTerm);
}

#[tokio::test]
async fn store_get_roundtrip_preserves_metadata() {
    let (manager, _) = engine();

    let stored = manager
        .store(
            "the gateway binds to stdio",
            StoreOptions {
                importance: Some(0.7),
                tags: vec!["infra".into()],
                source: MemorySource::User,
                layer: None,
            },
        )
        .await
        .unwrap();

    let fetched = manager.get(&stored.id).await.unwrap().unwrap();
    assert_eq!(fetched.content, "the gateway binds to stdio");
    assert_eq!(fetched.timestamp, stored.timestamp);
    assert_eq!(fetched.importance, stored.importance);
    assert_eq!(fetched.tags, stored.tags);
    assert_eq!(fetched.layer, stored.layer);
    assert_eq!(fetched.access_count, 0);

    // The stored embedding is unit-norm at the provider's dimension.
    let embedding = fetched.embedding.unwrap();
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn layer_filtering_returns_only_requested_layer() {
    let (manager, _) = engine();

    for layer in MemoryLayer::ALL {
        manager
            .store(
                "Test",
                StoreOptions {
                    layer: Some(layer),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let hits = manager
        .search(
            "Test",
            &SearchOptions {
                layer_filter: vec![MemoryLayer::Working],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.layer, MemoryLayer::Working);
}

#[tokio::test]
async fn access_counting_across_searches() {
    let (manager, _) = engine();
    let stored = manager.store("Hello", StoreOptions::default()).await.unwrap();

    manager.search("Hello", &SearchOptions::default()).await.unwrap();
    let before_second_search = now_ms();
    manager.search("Hello", &SearchOptions::default()).await.unwrap();

    let fetched = manager.get(&stored.id).await.unwrap().unwrap();
    assert_eq!(fetched.access_count, 2);
    assert!(fetched.last_accessed >= before_second_search);
    assert!(fetched.last_accessed >= fetched.timestamp);
}

#[tokio::test]
async fn consolidation_folds_two_tag_groups() {
    let (manager, store) = engine();
    let now = now_ms();

    // Three strong records survive as the retain set.
    for i in 0..3 {
        let record = manager
            .store(
                &format!("pinned {i}"),
                StoreOptions {
                    importance: Some(0.9),
                    tags: vec!["pinned".into()],
                    layer: Some(MemoryLayer::ShortTerm),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        backdate(&store, &record, 40).await;
    }

    // Ten aged records under two tags become consolidation fodder.
    for i in 0..10 {
        let tag = if i < 6 { "topic-a" } else { "topic-b" };
        let record = manager
            .store(
                &format!("memo {i} about {tag}"),
                StoreOptions {
                    importance: Some(0.6),
                    tags: vec![tag.to_string()],
                    layer: Some(MemoryLayer::ShortTerm),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        backdate(&store, &record, 40).await;
    }

    let result = manager
        .consolidate(&ConsolidateOptions {
            older_than: Some(now - 30 * DAY_MS),
            target_size: 3,
            layer: MemoryLayer::ShortTerm,
        })
        .await
        .unwrap();

    assert_eq!(result.consolidated.len(), 2, "{}", result.summary);
    assert_eq!(result.deleted.len(), 10);

    for folded in &result.consolidated {
        assert_eq!(folded.layer, MemoryLayer::LongTerm);
        assert_eq!(folded.source, MemorySource::System);
        assert!((folded.importance - 0.54).abs() < 1e-3);
        assert!(folded.tags.contains(&"consolidated".to_string()));
        assert!(folded.content.starts_with("[Consolidated Memory:"));
        assert!(folded.content.contains("\nTags: "));
        assert!(folded.content.contains("\nSummary: "));
    }

    // Group sizes 6 and 4, in tag order.
    assert!(result.consolidated[0]
        .content
        .starts_with("[Consolidated Memory: 6 entries"));
    assert!(result.consolidated[1]
        .content
        .starts_with("[Consolidated Memory: 4 entries"));

    // Originals are gone from the store; the retain set survives.
    for id in &result.deleted {
        assert!(store.get(id).await.unwrap().is_none());
    }
    assert_eq!(
        manager.count_layer(MemoryLayer::ShortTerm).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn consolidation_below_target_reports_and_changes_nothing() {
    let (manager, store) = engine();

    let record = manager
        .store(
            "lonely short-term note",
            StoreOptions {
                layer: Some(MemoryLayer::ShortTerm),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    backdate(&store, &record, 40).await;

    let result = manager.consolidate(&ConsolidateOptions::default()).await.unwrap();

    assert!(result.consolidated.is_empty());
    assert!(result.deleted.is_empty());
    assert!(!result.summary.is_empty());
    assert!(store.get(&record.id).await.unwrap().is_some());
}

#[tokio::test]
async fn decay_is_deterministic_and_idempotent() {
    let (manager, store) = engine();

    let record = manager
        .store(
            "fading fact",
            StoreOptions {
                importance: Some(1.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    backdate(&store, &record, 30).await;

    manager.apply_decay().await.unwrap();
    let first = store.get(&record.id).await.unwrap().unwrap().importance;
    assert!((first - (-0.1f32).exp()).abs() < 1e-4, "got {first}");

    // A second sweep at the same instant changes nothing.
    manager.apply_decay().await.unwrap();
    let second = store.get(&record.id).await.unwrap().unwrap().importance;
    assert!((first - second).abs() < 1e-12);
}

#[tokio::test]
async fn forget_by_layer_clears_the_tier() {
    let (manager, _) = engine();

    for i in 0..3 {
        manager
            .store(
                &format!("scratch {i}"),
                StoreOptions {
                    layer: Some(MemoryLayer::Working),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let result = manager
        .forget(&ForgetOptions {
            layer: Some(MemoryLayer::Working),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.deleted.len(), 3);
    assert!(manager
        .list(Some(MemoryLayer::Working), None, 100)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn forget_twice_is_idempotent() {
    let (manager, _) = engine();
    let record = manager.store("once", StoreOptions::default()).await.unwrap();

    let first = manager
        .forget(&ForgetOptions {
            memory_id: Some(record.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.deleted.len(), 1);
    assert!(manager.get(&record.id).await.unwrap().is_none());

    let second = manager
        .forget(&ForgetOptions {
            memory_id: Some(record.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(second.deleted.is_empty());
}

#[tokio::test]
async fn full_lifecycle_store_search_rebalance_consolidate() {
    let (manager, store) = engine();

    // A busy agent: facts arrive, some get hammered by searches, time passes.
    for i in 0..8 {
        manager
            .store(
                &format!("project decision number {i}"),
                StoreOptions {
                    importance: Some(0.6),
                    tags: vec!["decisions".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    // Repeated recall bumps access counters on everything it returns.
    for _ in 0..3 {
        let recalled = manager
            .recall("project decision", Some("weekly review"), 10)
            .await
            .unwrap();
        assert!(!recalled.memories.is_empty());
    }

    // Every record invariant holds after the traffic.
    for record in manager.list(None, None, 1_000).await.unwrap() {
        assert!((0.1..=1.0).contains(&record.importance));
        assert!(record.last_accessed >= record.timestamp);
        let id_hits = store.get(&record.id).await.unwrap();
        assert!(id_hits.is_some());
    }

    // Age the corpus and run the maintenance trio by hand.
    for record in manager.list(None, None, 1_000).await.unwrap() {
        backdate(&store, &record, 45).await;
    }
    manager.apply_decay().await.unwrap();
    manager.rebalance_layers().await.unwrap();
    let result = manager
        .consolidate(&ConsolidateOptions {
            target_size: 2,
            ..Default::default()
        })
        .await
        .unwrap();

    // Whatever moved, the corpus stays consistent: all surviving records
    // keep their invariants and the consolidated records are long-term.
    for folded in &result.consolidated {
        assert_eq!(folded.layer, MemoryLayer::LongTerm);
        assert_eq!(folded.source, MemorySource::System);
    }
    for record in manager.list(None, None, 1_000).await.unwrap() {
        assert!((0.1..=1.0).contains(&record.importance));
        assert!(record.last_accessed >= record.timestamp);
    }

    let stats = manager.stats().await.unwrap();
    assert_eq!(
        stats.total_memories,
        stats.by_layer.working + stats.by_layer.short_term + stats.by_layer.long_term
    );
}
