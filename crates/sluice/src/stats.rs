//! Lock-free pool statistics and worker state tracking.
//!
//! Every pool owns one [`PoolStats`] shared with its workers. Counters are
//! updated with relaxed atomics; a [`StatsSnapshot`] is therefore a
//! best-effort view and fields may be mutually inconsistent while the pool is
//! running. Once `shutdown` has returned, the snapshot is exact.

use portable_atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

#[cfg(feature = "cache-padded")]
type Counter = crossbeam_utils::CachePadded<AtomicU64>;
#[cfg(not(feature = "cache-padded"))]
type Counter = AtomicU64;

#[cfg(feature = "cache-padded")]
fn counter() -> Counter {
    crossbeam_utils::CachePadded::new(AtomicU64::new(0))
}
#[cfg(not(feature = "cache-padded"))]
const fn counter() -> Counter {
    AtomicU64::new(0)
}

/// Lifecycle state of a single worker.
///
/// ```text
/// Idle -> Fetching -> Processing -> Emitting -> Idle
///            |
///            +-> Stopped
/// ```
///
/// A worker also enters `Stopped` directly from `Processing` when its
/// transform fails fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Fetching = 1,
    Processing = 2,
    Emitting = 3,
    Stopped = 4,
}

impl WorkerState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Fetching,
            2 => Self::Processing,
            3 => Self::Emitting,
            _ => Self::Stopped,
        }
    }
}

/// Shared counters for one pool.
///
/// Workers are counted as live from construction, not from the moment their
/// thread or task first runs, so an early fatal exit can never observe a
/// spuriously empty pool.
#[derive(Debug)]
pub struct PoolStats {
    submitted: Counter,
    succeeded: Counter,
    failed: Counter,
    cancelled: Counter,
    fatal_workers: AtomicUsize,
    live_workers: AtomicUsize,
    states: Box<[AtomicU8]>,
}

impl PoolStats {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            submitted: counter(),
            succeeded: counter(),
            failed: counter(),
            cancelled: counter(),
            fatal_workers: AtomicUsize::new(0),
            live_workers: AtomicUsize::new(workers),
            states: (0..workers)
                .map(|_| AtomicU8::new(WorkerState::Idle as u8))
                .collect(),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome<T>(&self, result: &Result<T, crate::JobError>) {
        match result {
            Ok(_) => self.succeeded.fetch_add(1, Ordering::Relaxed),
            Err(crate::JobError::Cancelled) => self.cancelled.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Counts a worker that never got to run, e.g. when spawning failed.
    pub(crate) fn worker_never_started(&self, worker_id: usize) {
        self.set_state(worker_id, WorkerState::Stopped);
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
    }

    /// Marks a worker as stopped and returns how many workers are still live.
    pub(crate) fn worker_stopped(&self, worker_id: usize, fatal: bool) -> usize {
        self.set_state(worker_id, WorkerState::Stopped);
        if fatal {
            self.fatal_workers.fetch_add(1, Ordering::Relaxed);
        }
        self.live_workers.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn set_state(&self, worker_id: usize, state: WorkerState) {
        if let Some(slot) = self.states.get(worker_id) {
            slot.store(state as u8, Ordering::Relaxed);
        }
    }

    /// Number of workers currently running.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Current state of each worker, indexed by worker id.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .map(|slot| WorkerState::from_u8(slot.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            workers: self.states.len(),
            live_workers: self.live_workers(),
            fatal_workers: self.fatal_workers.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsSnapshot {
    /// Configured worker count.
    pub workers: usize,
    pub live_workers: usize,
    /// Workers stopped by a fatal transform error or panic.
    pub fatal_workers: usize,
    pub submitted: u64,
    pub succeeded: u64,
    /// Outcomes carrying any [`JobError`](crate::JobError) other than
    /// `Cancelled`.
    pub failed: u64,
    pub cancelled: u64,
}

impl StatsSnapshot {
    /// Returns `true` if at least one worker was lost to a fatal error.
    pub const fn is_degraded(&self) -> bool {
        self.fatal_workers > 0
    }

    /// Outcomes produced so far.
    pub const fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled
    }
}
