//! End-to-end consistency scenarios for the cache layer.
//!
//! Each test wires a query cache, the invalidator, the hard-reset path and
//! (where relevant) the auto-refresh scheduler the way a host application
//! does, then checks which entries are stale, evicted or untouched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pressroom::cache::{
    AutoRefreshConfig, AutoRefreshScheduler, CacheInvalidator, HERO_ARTICLES, HardReset,
    InvalidationPolicy, MemoryQueryCache, MutationCategory, POSTS, PROFILES, QueryCache, QueryKey,
    REPORTS, STATS, USERS,
};
use serde_json::json;

/// Query cache that records every call made to it.
#[derive(Default)]
struct RecordingCache {
    invalidated: Mutex<Vec<QueryKey>>,
    invalidate_all_calls: AtomicUsize,
    remove_all_calls: AtomicUsize,
}

impl RecordingCache {
    fn invalidations_of(&self, key: &QueryKey) -> usize {
        self.invalidated
            .lock()
            .expect("recording lock")
            .iter()
            .filter(|k| *k == key)
            .count()
    }
}

impl QueryCache for RecordingCache {
    fn invalidate(&self, key: &QueryKey) {
        self.invalidated
            .lock()
            .expect("recording lock")
            .push(key.clone());
    }

    fn invalidate_all(&self) {
        self.invalidate_all_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_all(&self) {
        self.remove_all_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn seeded_cache() -> Arc<MemoryQueryCache> {
    let cache = Arc::new(MemoryQueryCache::new());
    for name in [POSTS, HERO_ARTICLES, STATS, USERS, PROFILES, REPORTS] {
        cache.store(QueryKey::root(name), json!({ "name": name }));
    }
    cache.store(QueryKey::root(POSTS).child("breaking-news"), json!({}));
    cache
}

fn invalidator_for(
    cache: Arc<dyn QueryCache>,
    critical: Vec<MutationCategory>,
) -> (Arc<CacheInvalidator>, Arc<AtomicUsize>) {
    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = reloads.clone();
    let escalation = HardReset::new(
        cache.clone(),
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        critical,
    );
    (Arc::new(CacheInvalidator::new(cache, escalation)), reloads)
}

#[test]
fn post_mutation_leaves_users_untouched() {
    let cache = seeded_cache();
    let (invalidator, _) = invalidator_for(cache.clone(), vec![MutationCategory::FullReset]);

    invalidator.post_mutated();

    for name in [POSTS, HERO_ARTICLES, STATS] {
        assert_eq!(cache.is_stale(&QueryKey::root(name)), Some(true), "{name}");
    }
    assert_eq!(
        cache.is_stale(&QueryKey::root(POSTS).child("breaking-news")),
        Some(true)
    );
    for name in [USERS, PROFILES, REPORTS] {
        assert_eq!(cache.is_stale(&QueryKey::root(name)), Some(false), "{name}");
    }
}

#[test]
fn invalidation_issues_exactly_the_rule_keys() {
    for category in [
        MutationCategory::PostMutation,
        MutationCategory::UserMutation,
        MutationCategory::ReportMutation,
    ] {
        let recorder = Arc::new(RecordingCache::default());
        let (invalidator, _) = invalidator_for(recorder.clone(), vec![]);

        invalidator.invalidate(category);

        let issued = recorder.invalidated.lock().expect("recording lock").clone();
        assert_eq!(issued, InvalidationPolicy::keys_for(category), "{category}");
        assert_eq!(recorder.invalidate_all_calls.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.remove_all_calls.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn repeated_invalidation_matches_single_invalidation() {
    let once = seeded_cache();
    let twice = seeded_cache();
    let (first, _) = invalidator_for(once.clone(), vec![]);
    let (second, _) = invalidator_for(twice.clone(), vec![]);

    first.invalidate(MutationCategory::ReportMutation);
    second.invalidate(MutationCategory::ReportMutation);
    second.invalidate(MutationCategory::ReportMutation);

    assert_eq!(once.stale_keys(), twice.stale_keys());
    assert_eq!(once.valid_count(), twice.valid_count());
}

#[test]
fn force_refresh_leaves_no_valid_entry_and_reloads_once() {
    let cache = seeded_cache();
    let (invalidator, reloads) = invalidator_for(cache.clone(), vec![]);

    invalidator.force_refresh();

    assert_eq!(cache.valid_count(), 0);
    assert!(cache.is_empty());
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
}

#[test]
fn critical_mutation_skips_soft_invalidation() {
    let recorder = Arc::new(RecordingCache::default());
    let (invalidator, reloads) = invalidator_for(recorder.clone(), vec![MutationCategory::FullReset]);

    invalidator.mutation_completed(MutationCategory::FullReset);

    assert!(recorder.invalidated.lock().expect("recording lock").is_empty());
    assert_eq!(recorder.remove_all_calls.load(Ordering::SeqCst), 1);
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
}

#[test]
fn invalidate_all_delegates_to_cache() {
    let recorder = Arc::new(RecordingCache::default());
    let (invalidator, reloads) = invalidator_for(recorder.clone(), vec![]);

    invalidator.invalidate_all();

    assert_eq!(recorder.invalidate_all_calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.remove_all_calls.load(Ordering::SeqCst), 0);
    assert_eq!(reloads.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn scheduler_invalidates_posts_once_per_second_until_stopped() {
    let recorder = Arc::new(RecordingCache::default());
    let (invalidator, _) = invalidator_for(recorder.clone(), vec![]);
    let scheduler = AutoRefreshScheduler::new(invalidator);
    let posts = QueryKey::root(POSTS);

    let mut handle = scheduler
        .start(&AutoRefreshConfig {
            interval_ms: 1000,
            enabled: true,
            keys: vec![posts.clone()],
        })
        .expect("scheduler should start");

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(recorder.invalidations_of(&posts), 4);

    handle.stop();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.invalidations_of(&posts), 4);
}

#[tokio::test(start_paused = true)]
async fn default_scheduler_runs_two_cycles_in_65_seconds() {
    let recorder = Arc::new(RecordingCache::default());
    let (invalidator, _) = invalidator_for(recorder.clone(), vec![]);
    let scheduler = AutoRefreshScheduler::new(invalidator);

    let mut handle = scheduler
        .start(&AutoRefreshConfig::default())
        .expect("scheduler should start");

    tokio::time::sleep(Duration::from_secs(65)).await;
    handle.stop();

    assert_eq!(handle.cycles(), 2);
    for name in [POSTS, HERO_ARTICLES, STATS] {
        assert_eq!(recorder.invalidations_of(&QueryKey::root(name)), 2, "{name}");
    }
    assert_eq!(recorder.invalidations_of(&QueryKey::root(USERS)), 0);
}

#[tokio::test(start_paused = true)]
async fn disabled_scheduler_never_fires() {
    let recorder = Arc::new(RecordingCache::default());
    let (invalidator, _) = invalidator_for(recorder.clone(), vec![]);
    let scheduler = AutoRefreshScheduler::new(invalidator);

    let mut handle = scheduler
        .start(&AutoRefreshConfig {
            enabled: false,
            ..Default::default()
        })
        .expect("disabled scheduler still yields a handle");

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(recorder.invalidated.lock().expect("recording lock").is_empty());

    handle.stop();
    assert!(!handle.is_running());
}

#[tokio::test(start_paused = true)]
async fn scheduled_and_event_invalidation_interleave_safely() {
    let cache = seeded_cache();
    let (invalidator, reloads) = invalidator_for(cache.clone(), vec![MutationCategory::FullReset]);
    let scheduler = AutoRefreshScheduler::new(invalidator.clone());

    let _handle = scheduler
        .start(&AutoRefreshConfig {
            interval_ms: 1000,
            enabled: true,
            keys: vec![QueryKey::root(POSTS)],
        })
        .expect("scheduler should start");

    invalidator.post_mutated();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    invalidator.post_mutated();

    let mut stale: Vec<String> = cache.stale_keys().iter().map(ToString::to_string).collect();
    stale.sort();
    assert_eq!(stale, ["heroArticles", "posts", "posts/breaking-news", "stats"]);
    assert_eq!(reloads.load(Ordering::SeqCst), 0);
}

#[test]
fn key_read_back_from_text_reaches_string_segment_entries() {
    let cache = seeded_cache();
    let slug_key = QueryKey::root(POSTS).child("42");
    let id_key = QueryKey::root(POSTS).child(42_i64);
    cache.store(slug_key.clone(), json!({ "slug": "42" }));
    cache.store(id_key.clone(), json!({ "id": 42 }));

    let text = serde_json::to_string(&slug_key).expect("serialize key");
    let read_back: QueryKey = serde_json::from_str(&text).expect("deserialize key");
    cache.invalidate(&read_back);

    assert_eq!(cache.is_stale(&slug_key), Some(true));
    assert_eq!(cache.is_stale(&id_key), Some(false));
}
