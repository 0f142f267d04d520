//! Cache configuration.
//!
//! Controls the auto-refresh scheduler and the hard-reset allow-list via
//! `pressroom.toml`.

use std::time::Duration;

use serde::Deserialize;

use super::events::MutationCategory;
use super::keys::{HERO_ARTICLES, POSTS, QueryKey, STATS};
use super::policy::InvalidationPolicy;
use super::scheduler::SchedulerError;

// Default values for cache configuration
pub(crate) const DEFAULT_AUTO_REFRESH_INTERVAL_MS: u64 = 30_000;
pub(crate) const DEFAULT_AUTO_REFRESH_KEYS: [&str; 3] = [POSTS, HERO_ARTICLES, STATS];

/// Auto-refresh scheduler settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutoRefreshConfig {
    /// Milliseconds between refresh cycles. Must be greater than zero.
    pub interval_ms: u64,
    /// When false the scheduler never starts a timer.
    pub enabled: bool,
    /// Keys invalidated on every cycle.
    pub keys: Vec<QueryKey>,
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_AUTO_REFRESH_INTERVAL_MS,
            enabled: true,
            keys: DEFAULT_AUTO_REFRESH_KEYS
                .iter()
                .map(|name| QueryKey::root(*name))
                .collect(),
        }
    }
}

impl AutoRefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval_ms == 0 {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(())
    }
}

/// Cache consistency configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub auto_refresh: AutoRefreshConfig,
    /// Categories that escalate to a hard reset instead of soft invalidation.
    pub hard_reset_categories: Vec<MutationCategory>,
    /// Keys the UI can refetch; every rule key must fall under one of them.
    pub refetchable_keys: Vec<QueryKey>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            auto_refresh: AutoRefreshConfig::default(),
            hard_reset_categories: vec![MutationCategory::FullReset],
            refetchable_keys: InvalidationPolicy::known_keys().to_vec(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            auto_refresh: AutoRefreshConfig {
                interval_ms: settings.auto_refresh_interval_ms,
                enabled: settings.auto_refresh_enabled,
                keys: settings.auto_refresh_keys.clone(),
            },
            hard_reset_categories: settings.hard_reset_categories.clone(),
            refetchable_keys: settings.refetchable_keys.clone(),
        }
    }
}
