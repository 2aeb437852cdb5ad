use derive_more::{Add, AddAssign};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

///
/// OpsCounters
/// Snapshot of the global operation counters. Snapshots merge with `+`.
///

#[derive(Add, AddAssign, Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OpsCounters {
    pub cache_hits_pk: u64,
    pub cache_misses_pk: u64,
    pub cache_hits_and: u64,
    pub cache_misses_and: u64,
    pub cache_hits_all: u64,
    pub cache_misses_all: u64,
    pub statements_executed: u64,
    pub rows_fetched: u64,
    pub sequence_refills: u64,
    pub transform_retries: u64,
    pub lock_conflicts: u64,
}

///
/// CounterState
/// Process-global counter cells behind atomics.
///

#[derive(Default)]
pub(crate) struct CounterState {
    pub cache_hits_pk: AtomicU64,
    pub cache_misses_pk: AtomicU64,
    pub cache_hits_and: AtomicU64,
    pub cache_misses_and: AtomicU64,
    pub cache_hits_all: AtomicU64,
    pub cache_misses_all: AtomicU64,
    pub statements_executed: AtomicU64,
    pub rows_fetched: AtomicU64,
    pub sequence_refills: AtomicU64,
    pub transform_retries: AtomicU64,
    pub lock_conflicts: AtomicU64,
}

pub(crate) static STATE: CounterState = CounterState {
    cache_hits_pk: AtomicU64::new(0),
    cache_misses_pk: AtomicU64::new(0),
    cache_hits_and: AtomicU64::new(0),
    cache_misses_and: AtomicU64::new(0),
    cache_hits_all: AtomicU64::new(0),
    cache_misses_all: AtomicU64::new(0),
    statements_executed: AtomicU64::new(0),
    rows_fetched: AtomicU64::new(0),
    sequence_refills: AtomicU64::new(0),
    transform_retries: AtomicU64::new(0),
    lock_conflicts: AtomicU64::new(0),
};

/// Snapshot the current counters.
#[must_use]
pub fn snapshot() -> OpsCounters {
    OpsCounters {
        cache_hits_pk: STATE.cache_hits_pk.load(Ordering::Relaxed),
        cache_misses_pk: STATE.cache_misses_pk.load(Ordering::Relaxed),
        cache_hits_and: STATE.cache_hits_and.load(Ordering::Relaxed),
        cache_misses_and: STATE.cache_misses_and.load(Ordering::Relaxed),
        cache_hits_all: STATE.cache_hits_all.load(Ordering::Relaxed),
        cache_misses_all: STATE.cache_misses_all.load(Ordering::Relaxed),
        statements_executed: STATE.statements_executed.load(Ordering::Relaxed),
        rows_fetched: STATE.rows_fetched.load(Ordering::Relaxed),
        sequence_refills: STATE.sequence_refills.load(Ordering::Relaxed),
        transform_retries: STATE.transform_retries.load(Ordering::Relaxed),
        lock_conflicts: STATE.lock_conflicts.load(Ordering::Relaxed),
    }
}

/// Reset all counters to zero.
pub fn reset_all() {
    STATE.cache_hits_pk.store(0, Ordering::Relaxed);
    STATE.cache_misses_pk.store(0, Ordering::Relaxed);
    STATE.cache_hits_and.store(0, Ordering::Relaxed);
    STATE.cache_misses_and.store(0, Ordering::Relaxed);
    STATE.cache_hits_all.store(0, Ordering::Relaxed);
    STATE.cache_misses_all.store(0, Ordering::Relaxed);
    STATE.statements_executed.store(0, Ordering::Relaxed);
    STATE.rows_fetched.store(0, Ordering::Relaxed);
    STATE.sequence_refills.store(0, Ordering::Relaxed);
    STATE.transform_retries.store(0, Ordering::Relaxed);
    STATE.lock_conflicts.store(0, Ordering::Relaxed);
}
