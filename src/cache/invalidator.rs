//! Cache invalidator service.
//!
//! Entry point for mutation call sites: report what kind of write completed
//! and the invalidator applies the matching rule, or escalates to a hard
//! reset for categories on the critical allow-list.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};

use super::escalation::HardReset;
use super::events::MutationCategory;
use super::keys::QueryKey;
use super::policy::InvalidationPolicy;
use super::store::QueryCache;

const METRIC_INVALIDATIONS: &str = "pressroom_cache_invalidations_total";

/// Applies the invalidation rule table to a query cache.
///
/// # Usage
///
/// ```ignore
/// // After a successful article save:
/// invalidator.post_mutated();
/// ```
pub struct CacheInvalidator {
    cache: Arc<dyn QueryCache>,
    escalation: HardReset,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn QueryCache>, escalation: HardReset) -> Self {
        Self { cache, escalation }
    }

    /// Mark exactly the keys of `category`'s rule stale.
    ///
    /// Never refetches; the next read of a stale key does.
    pub fn invalidate(&self, category: MutationCategory) {
        let keys = InvalidationPolicy::keys_for(category);
        for key in keys {
            self.cache.invalidate(key);
        }

        info!(
            category = %category,
            key_count = keys.len(),
            "Cache invalidated for mutation"
        );
        counter!(METRIC_INVALIDATIONS, "source" => "mutation").increment(1);
    }

    /// Mark every cached entry stale.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        info!("Cache invalidated: all entries");
        counter!(METRIC_INVALIDATIONS, "source" => "all").increment(1);
    }

    /// Mark the given keys stale. Used by the auto-refresh scheduler.
    pub fn invalidate_keys(&self, keys: &[QueryKey]) {
        for key in keys {
            self.cache.invalidate(key);
        }
        debug!(key_count = keys.len(), "Cache invalidated: scheduled keys");
        counter!(METRIC_INVALIDATIONS, "source" => "scheduled").increment(1);
    }

    /// Report a completed write.
    ///
    /// Critical categories escalate to [`HardReset::force_refresh`]; every
    /// other category is invalidated softly.
    pub fn mutation_completed(&self, category: MutationCategory) {
        if self.escalation.is_critical(category) {
            info!(category = %category, "Critical mutation, escalating to hard reset");
            self.escalation.force_refresh();
        } else {
            self.invalidate(category);
        }
    }

    pub fn post_mutated(&self) {
        self.mutation_completed(MutationCategory::PostMutation);
    }

    pub fn user_mutated(&self) {
        self.mutation_completed(MutationCategory::UserMutation);
    }

    pub fn report_mutated(&self) {
        self.mutation_completed(MutationCategory::ReportMutation);
    }

    /// Evict everything and reload, regardless of category.
    pub fn force_refresh(&self) {
        self.escalation.force_refresh();
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    pub fn escalation(&self) -> &HardReset {
        &self.escalation
    }
}
