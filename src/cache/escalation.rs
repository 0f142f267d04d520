//! Hard-reset escalation.
//!
//! For mutations that cannot tolerate any staleness window, the whole cache
//! is evicted and the host is reloaded. This trades a visible reload for the
//! guarantee that no view can show data from before the mutation.

use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use super::events::MutationCategory;
use super::reload::PageReloader;
use super::store::QueryCache;

const METRIC_HARD_RESETS: &str = "pressroom_cache_hard_resets_total";

pub struct HardReset {
    cache: Arc<dyn QueryCache>,
    reloader: Arc<dyn PageReloader>,
    critical: Vec<MutationCategory>,
}

impl HardReset {
    pub fn new(
        cache: Arc<dyn QueryCache>,
        reloader: Arc<dyn PageReloader>,
        critical: Vec<MutationCategory>,
    ) -> Self {
        Self {
            cache,
            reloader,
            critical,
        }
    }

    /// Whether `category` is on the escalation allow-list.
    pub fn is_critical(&self, category: MutationCategory) -> bool {
        self.critical.contains(&category)
    }

    pub fn critical_categories(&self) -> &[MutationCategory] {
        &self.critical
    }

    /// Evict every cache entry, then reload the host exactly once.
    pub fn force_refresh(&self) {
        warn!(
            critical = ?self.critical,
            "Hard reset: evicting query cache and reloading"
        );
        self.cache.remove_all();
        counter!(METRIC_HARD_RESETS).increment(1);
        self.reloader.reload();
    }
}
