//! Periodic performance reporting.
//!
//! Observational only: the monitor reads counters, logs a summary, and
//! publishes [`EngineEvent::PerformanceMetrics`]. It never changes engine
//! behaviour.

use std::sync::Weak;
use std::time::Duration;

use galactic_types::{EngineEvent, PerformanceSnapshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::engine::EngineInner;

/// Lookups required before a low hit rate is worth a warning.
pub const MIN_LOOKUPS_FOR_HIT_RATE: u64 = 100;

/// Samples engine counters on an interval.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceMonitor {
    interval: Duration,
    hit_rate_target: f64,
}

impl PerformanceMonitor {
    /// Create a monitor sampling every `interval`.
    pub const fn new(interval: Duration, hit_rate_target: f64) -> Self {
        Self {
            interval,
            hit_rate_target,
        }
    }

    /// Arm the sampling interval. The task exits when the engine is
    /// dropped.
    pub(crate) fn start(self, engine: Weak<EngineInner>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let now = Instant::now();
            let mut ticker = interval_at(now.checked_add(self.interval).unwrap_or(now), self.interval);
            loop {
                ticker.tick().await;
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                let performance = inner.performance().await;
                self.report(&performance, inner.cache_lookups());
                inner
                    .events
                    .emit(EngineEvent::PerformanceMetrics { performance });
            }
            debug!("Performance monitor stopped");
        })
    }

    /// Log a one-line summary. Returns `true` if the cache hit rate
    /// warning fired.
    pub fn report(&self, performance: &PerformanceSnapshot, cache_lookups: u64) -> bool {
        info!(
            avg_tick_ms = performance.avg_tick_time_ms,
            actions_per_sec = performance.processed_actions_per_second,
            processed_total = performance.processed_actions_total,
            cache_hit_rate = performance.cache_hit_rate,
            active_players = performance.active_player_count,
            total_players = performance.total_player_count,
            queued = performance.total_queued,
            shed = performance.shed_actions,
            missed_deadlines = performance.missed_batch_deadlines,
            "Performance"
        );
        let low_hit_rate = cache_lookups >= MIN_LOOKUPS_FOR_HIT_RATE
            && performance.cache_hit_rate < self.hit_rate_target;
        if low_hit_rate {
            warn!(
                cache_hit_rate = performance.cache_hit_rate,
                target = self.hit_rate_target,
                "Cache hit rate below target"
            );
        }
        low_hit_rate
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(hit_rate: f64) -> PerformanceSnapshot {
        PerformanceSnapshot {
            cache_hit_rate: hit_rate,
            ..PerformanceSnapshot::default()
        }
    }

    #[test]
    fn low_hit_rate_warns_after_enough_lookups() {
        let monitor = PerformanceMonitor::new(Duration::from_secs(60), 0.85);
        assert!(monitor.report(&snapshot(0.5), 100));
        assert!(!monitor.report(&snapshot(0.9), 100));
    }

    #[test]
    fn few_lookups_never_warn() {
        let monitor = PerformanceMonitor::new(Duration::from_secs(60), 0.85);
        assert!(!monitor.report(&snapshot(0.0), 99));
    }
}
