//! Auto-refresh scheduler.
//!
//! Bounds staleness caused by writes this client never sees (other editors,
//! other sessions) by invalidating a fixed key set on a timer. The running
//! timer is an owned [`AutoRefreshHandle`]; dropping or stopping the handle
//! is the only way to release it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use super::config::AutoRefreshConfig;
use super::invalidator::CacheInvalidator;

const METRIC_AUTO_REFRESH_CYCLES: &str = "pressroom_auto_refresh_cycles_total";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("auto-refresh interval must be greater than zero")]
    ZeroInterval,
    #[error("auto-refresh requires a running tokio runtime")]
    NoRuntime,
}

/// Starts auto-refresh timers against one invalidator.
pub struct AutoRefreshScheduler {
    invalidator: Arc<CacheInvalidator>,
}

impl AutoRefreshScheduler {
    pub fn new(invalidator: Arc<CacheInvalidator>) -> Self {
        Self { invalidator }
    }

    /// Start a refresh timer.
    ///
    /// The first cycle fires one full interval after this call. A disabled
    /// config yields an idle handle and spawns nothing.
    pub fn start(&self, config: &AutoRefreshConfig) -> Result<AutoRefreshHandle, SchedulerError> {
        config.validate()?;

        let cycles = Arc::new(AtomicU64::new(0));
        if !config.enabled {
            debug!("Auto refresh disabled, scheduler stays idle");
            return Ok(AutoRefreshHandle {
                task: None,
                cycles,
            });
        }

        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let period = config.interval();
        let first_tick = Instant::now() + period;
        let keys = config.keys.clone();
        let invalidator = self.invalidator.clone();
        let task_cycles = cycles.clone();

        let key_names: Vec<String> = keys.iter().map(ToString::to_string).collect();
        info!(
            interval_ms = config.interval_ms,
            keys = ?key_names,
            "Auto refresh started"
        );

        let task = runtime.spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                invalidator.invalidate_keys(&keys);
                let cycle = task_cycles.fetch_add(1, Ordering::SeqCst) + 1;
                counter!(METRIC_AUTO_REFRESH_CYCLES).increment(1);
                debug!(cycle, "Auto refresh cycle complete");
            }
        });

        Ok(AutoRefreshHandle {
            task: Some(task),
            cycles,
        })
    }
}

/// Owned auto-refresh timer.
///
/// Stopping is idempotent. Dropping the handle stops the timer, so a torn
/// down owner never leaves a timer firing behind it.
#[derive(Debug)]
pub struct AutoRefreshHandle {
    task: Option<JoinHandle<()>>,
    cycles: Arc<AtomicU64>,
}

impl AutoRefreshHandle {
    /// Cancel the timer. No-op when already stopped or never started.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!(
                cycles = self.cycles.load(Ordering::SeqCst),
                "Auto refresh stopped"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Number of refresh cycles that have fired so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl Drop for AutoRefreshHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::cache::escalation::HardReset;
    use crate::cache::keys::{POSTS, QueryKey, USERS};
    use crate::cache::reload::NoopReloader;
    use crate::cache::store::MemoryQueryCache;

    fn scheduler() -> (Arc<MemoryQueryCache>, AutoRefreshScheduler) {
        let cache = Arc::new(MemoryQueryCache::new());
        let escalation = HardReset::new(cache.clone(), Arc::new(NoopReloader), vec![]);
        let invalidator = Arc::new(CacheInvalidator::new(cache.clone(), escalation));
        (cache, AutoRefreshScheduler::new(invalidator))
    }

    fn posts_only(interval_ms: u64) -> AutoRefreshConfig {
        AutoRefreshConfig {
            interval_ms,
            enabled: true,
            keys: vec![QueryKey::root(POSTS)],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_interval_until_stopped() {
        let (_, scheduler) = scheduler();
        let mut handle = scheduler.start(&posts_only(1000)).expect("start");
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(handle.cycles(), 0);

        tokio::time::sleep(Duration::from_millis(2501)).await;
        assert_eq!(handle.cycles(), 3);

        handle.stop();
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(handle.cycles(), 3);
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn only_configured_keys_go_stale() {
        let (cache, scheduler) = scheduler();
        cache.store(QueryKey::root(POSTS), json!([]));
        cache.store(QueryKey::root(USERS), json!([]));

        let _handle = scheduler.start(&posts_only(1000)).expect("start");
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.is_stale(&QueryKey::root(POSTS)), Some(true));
        assert_eq!(cache.is_stale(&QueryKey::root(USERS)), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_config_never_fires() {
        let (_, scheduler) = scheduler();
        let config = AutoRefreshConfig {
            enabled: false,
            ..posts_only(10)
        };
        let handle = scheduler.start(&config).expect("start");
        assert!(!handle.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handle.cycles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_safe_when_idle() {
        let (_, scheduler) = scheduler();
        let mut idle = scheduler
            .start(&AutoRefreshConfig {
                enabled: false,
                ..Default::default()
            })
            .expect("start");
        idle.stop();
        idle.stop();

        let mut running = scheduler.start(&posts_only(1000)).expect("start");
        running.stop();
        running.stop();
        assert!(!running.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop() {
        let (_, scheduler) = scheduler();
        let mut first = scheduler.start(&posts_only(1000)).expect("start");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        first.stop();

        let second = scheduler.start(&posts_only(1000)).expect("restart");
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(first.cycles(), 1);
        assert_eq!(second.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_timer() {
        let (cache, scheduler) = scheduler();
        cache.store(QueryKey::root(POSTS), json!([]));

        let handle = scheduler.start(&posts_only(1000)).expect("start");
        drop(handle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cache.is_stale(&QueryKey::root(POSTS)), Some(false));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let (_, scheduler) = scheduler();
        let err = scheduler.start(&posts_only(0)).unwrap_err();
        assert_eq!(err, SchedulerError::ZeroInterval);
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let (_, scheduler) = scheduler();
        let err = scheduler.start(&posts_only(1000)).unwrap_err();
        assert_eq!(err, SchedulerError::NoRuntime);
    }

    #[test]
    fn disabled_start_outside_runtime_is_fine() {
        let (_, scheduler) = scheduler();
        let config = AutoRefreshConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(scheduler.start(&config).is_ok());
    }
}
