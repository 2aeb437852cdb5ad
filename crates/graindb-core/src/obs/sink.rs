//! Metrics sink boundary.
//!
//! Core execution logic MUST NOT touch the global counter state directly.
//! All instrumentation flows through MetricsEvent and MetricsSink; this
//! module is the only bridge between execution logic and counter state.

use crate::obs::metrics::{self, STATE};
use std::sync::{
    Arc, RwLock,
    atomic::Ordering,
};

///
/// CacheTier
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheTier {
    Pk,
    And,
    All,
}

///
/// StatementKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    CacheHit { tier: CacheTier },
    CacheMiss { tier: CacheTier },
    StatementExecuted { kind: StatementKind },
    RowsFetched { rows: u64 },
    SequenceRefill,
    TransformRetry,
    LockConflict,
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default process-wide sink that writes into the global counter state.

struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::CacheHit { tier } => {
                let cell = match tier {
                    CacheTier::Pk => &STATE.cache_hits_pk,
                    CacheTier::And => &STATE.cache_hits_and,
                    CacheTier::All => &STATE.cache_hits_all,
                };
                cell.fetch_add(1, Ordering::Relaxed);
            }
            MetricsEvent::CacheMiss { tier } => {
                let cell = match tier {
                    CacheTier::Pk => &STATE.cache_misses_pk,
                    CacheTier::And => &STATE.cache_misses_and,
                    CacheTier::All => &STATE.cache_misses_all,
                };
                cell.fetch_add(1, Ordering::Relaxed);
            }
            MetricsEvent::StatementExecuted { .. } => {
                STATE.statements_executed.fetch_add(1, Ordering::Relaxed);
            }
            MetricsEvent::RowsFetched { rows } => {
                STATE.rows_fetched.fetch_add(rows, Ordering::Relaxed);
            }
            MetricsEvent::SequenceRefill => {
                STATE.sequence_refills.fetch_add(1, Ordering::Relaxed);
            }
            MetricsEvent::TransformRetry => {
                STATE.transform_retries.fetch_add(1, Ordering::Relaxed);
            }
            MetricsEvent::LockConflict => {
                STATE.lock_conflicts.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

static GLOBAL_SINK: GlobalMetricsSink = GlobalMetricsSink;

static SINK_OVERRIDE: RwLock<Option<Arc<dyn MetricsSink>>> = RwLock::new(None);

/// Record one event through the installed sink.
pub fn record(event: MetricsEvent) {
    let override_sink = SINK_OVERRIDE
        .read()
        .ok()
        .and_then(|guard| guard.as_ref().map(Arc::clone));
    match override_sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_SINK.record(event),
    }
}

/// Run a closure with a temporary metrics sink override.
///
/// The previous sink is restored on all exits, including unwind.
pub fn with_metrics_sink<T>(sink: Arc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Arc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            if let Ok(mut slot) = SINK_OVERRIDE.write() {
                *slot = self.0.take();
            }
        }
    }

    let prev = {
        let mut slot = SINK_OVERRIDE.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.replace(sink)
    };
    let _guard = Guard(prev);

    f()
}

/// Snapshot the global counters.
#[must_use]
pub fn metrics_snapshot() -> metrics::OpsCounters {
    metrics::snapshot()
}

/// Reset the global counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct CountingSink {
        calls: AtomicUsize,
    }

    impl MetricsSink for CountingSink {
        fn record(&self, _: MetricsEvent) {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    #[test]
    fn override_routes_and_restores() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });

        with_metrics_sink(sink.clone(), || {
            record(MetricsEvent::SequenceRefill);
            record(MetricsEvent::TransformRetry);
        });

        // The override is process-global, so concurrently running tests may
        // have added events of their own; assert a lower bound only.
        let after_closure = sink.calls.load(AtomicOrdering::SeqCst);
        assert!(after_closure >= 2);

        // Override removed; further events no longer reach the sink.
        let before = metrics_snapshot().lock_conflicts;
        record(MetricsEvent::LockConflict);
        assert!(metrics_snapshot().lock_conflicts >= before + 1);
        assert_eq!(sink.calls.load(AtomicOrdering::SeqCst), after_closure);
    }
}
