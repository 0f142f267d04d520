//! Query cache adapter.
//!
//! The consistency layer only needs three operations from a query cache:
//! mark one key stale, mark everything stale, evict everything. Hosts plug
//! their own cache in through [`QueryCache`]; [`MemoryQueryCache`] is the
//! in-process implementation used by the binary and the tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::keys::QueryKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Operations the consistency layer performs on a query cache.
///
/// Implementations must treat invalidation of an absent key as a no-op and
/// must never fail observably.
pub trait QueryCache: Send + Sync {
    /// Mark every entry whose key `key` is a prefix of as stale.
    fn invalidate(&self, key: &QueryKey);

    /// Mark every entry stale.
    fn invalidate_all(&self);

    /// Evict every entry, discarding cached data.
    fn remove_all(&self);
}

/// One cached query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub data: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
    pub stale: bool,
}

/// In-memory query cache keyed by [`QueryKey`].
#[derive(Debug, Default)]
pub struct MemoryQueryCache {
    entries: RwLock<BTreeMap<QueryKey, CacheEntry>>,
}

impl MemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fetch result. Creates the entry or refreshes it as fresh.
    pub fn store(&self, key: QueryKey, data: Value) {
        let entry = CacheEntry {
            data,
            fetched_at: OffsetDateTime::now_utc(),
            stale: false,
        };
        rw_write(&self.entries, SOURCE, "store").insert(key, entry);
    }

    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        rw_read(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// `None` when no entry exists for `key`.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        rw_read(&self.entries, SOURCE, "is_stale")
            .get(key)
            .map(|entry| entry.stale)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries that are present and not stale.
    pub fn valid_count(&self) -> usize {
        rw_read(&self.entries, SOURCE, "valid_count")
            .values()
            .filter(|entry| !entry.stale)
            .count()
    }

    pub fn stale_keys(&self) -> Vec<QueryKey> {
        rw_read(&self.entries, SOURCE, "stale_keys")
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Sorted copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<QueryKey, CacheEntry> {
        rw_read(&self.entries, SOURCE, "snapshot").clone()
    }
}

impl QueryCache for MemoryQueryCache {
    fn invalidate(&self, key: &QueryKey) {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        for (candidate, entry) in entries.iter_mut() {
            if key.is_prefix_of(candidate) {
                entry.stale = true;
            }
        }
    }

    fn invalidate_all(&self) {
        for entry in rw_write(&self.entries, SOURCE, "invalidate_all").values_mut() {
            entry.stale = true;
        }
    }

    fn remove_all(&self) {
        rw_write(&self.entries, SOURCE, "remove_all").clear();
    }
}
