//! Pressroom cache consistency layer
//!
//! Decides when locally cached query results stop being trusted:
//!
//! - **Invalidation policy**: a static table mapping each mutation category
//!   to the query keys it makes stale
//! - **Auto refresh**: a timer that invalidates a fixed key set so staleness
//!   from writes made elsewhere stays bounded
//! - **Hard reset**: evict everything and reload for critical mutations
//!
//! ## Configuration
//!
//! Behavior is controlled via `pressroom.toml`:
//!
//! ```toml
//! [cache]
//! auto_refresh_interval_ms = 30000
//! auto_refresh_enabled = true
//! auto_refresh_keys = ["posts", "heroArticles", "stats"]
//! hard_reset_categories = ["full-reset"]
//! ```

mod config;
mod escalation;
mod events;
mod invalidator;
mod keys;
mod lock;
mod policy;
mod reload;
mod scheduler;
mod store;

pub use config::{AutoRefreshConfig, CacheConfig};
pub(crate) use config::{DEFAULT_AUTO_REFRESH_INTERVAL_MS, DEFAULT_AUTO_REFRESH_KEYS};
pub use escalation::HardReset;
pub use events::{MutationCategory, UnknownCategory};
pub use invalidator::CacheInvalidator;
pub use keys::{
    HERO_ARTICLES, KeyParseError, KeySegment, POSTS, PROFILES, QueryKey, REPORTS, STATS, USERS,
};
pub use policy::{DanglingTarget, InvalidationPolicy, PolicyError};
pub use reload::{NoopReloader, PageReloader};
pub use scheduler::{AutoRefreshHandle, AutoRefreshScheduler, SchedulerError};
pub use store::{CacheEntry, MemoryQueryCache, QueryCache};
