//! Blocking worker pool backed by OS threads.
//!
//! This module defines [`ThreadPool`], which spawns a fixed set of worker
//! threads sharing one bounded job queue and one bounded result sink, both
//! [`crossbeam_channel`] channels. The queue is multi-consumer, so each job is
//! received by exactly one worker and idle workers steal naturally from the
//! same FIFO.
//!
//! Shutdown comes in two forms:
//!
//! - **Drain** closes the queue. Workers finish everything already queued and
//!   exit once the queue is empty.
//! - **Fast stop** raises the [`StopSignal`] and closes the queue. Workers
//!   finish the job in hand and exit; jobs still queued are reported as
//!   [`JobError::Cancelled`].
//!
//! In both cases every worker is joined before the controller drops its last
//! handle on the result sink, so a consumer never sees the outcome stream end
//! while a worker could still emit.

use super::{Results, signal::StopSignal, worker::Worker};
use crate::{
    Error, Job, JobError, Outcome, PoolConfig, PoolStats, Result, StatsSnapshot, Transform,
    WorkerState, sequencer::Sequencer,
};
use crossbeam_channel::{Receiver, Sender, bounded, select};
use parking_lot::{Mutex, RwLock};
use portable_atomic::{AtomicBool, Ordering};
use std::{sync::Arc, thread::JoinHandle};

/// State shared between the controller and every worker.
pub(crate) struct Shared<In> {
    /// `None` once the queue is closed. Submitters hold a read guard for the
    /// whole send so closing waits for sends already in progress.
    queue: RwLock<Option<Sender<Job<In>>>>,
    pub(crate) stop: StopSignal,
    pub(crate) stats: PoolStats,
}

impl<In> Shared<In> {
    /// Drops the queue sender. Workers exit once the queue is drained.
    pub(crate) fn close_queue(&self) -> bool {
        self.queue.write().take().is_some()
    }
}

/// A fixed-size pool of worker threads applying a [`Transform`] to jobs.
///
/// `ThreadPool` is `Sync`: share it behind an [`Arc`] to submit from several
/// threads while another thread drains [`ThreadPool::results`].
///
/// # Example
///
/// ```
/// use sluice::{PoolConfig, ThreadPool, TransformError};
///
/// let pool = ThreadPool::new(PoolConfig::default().with_workers(3), |x: u64| {
///     Ok::<_, TransformError>(x * 2)
/// })
/// .unwrap();
///
/// for n in 1..=5 {
///     pool.submit(n).unwrap();
/// }
/// pool.shutdown(true).unwrap();
///
/// let mut doubled: Vec<u64> = pool
///     .results()
///     .unwrap()
///     .filter_map(|outcome| outcome.ok_value())
///     .collect();
/// doubled.sort_unstable();
/// assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
/// ```
pub struct ThreadPool<In, Out> {
    config: PoolConfig,
    shared: Arc<Shared<In>>,
    queue_rx: Receiver<Job<In>>,
    results_tx: Mutex<Option<Sender<Outcome<Out>>>>,
    results_rx: Mutex<Option<Receiver<Outcome<Out>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_seq: Mutex<u64>,
    shutdown: AtomicBool,
}

impl<In, Out> ThreadPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Validates `config` and spawns `config.workers` threads.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the config fails
    ///   [`PoolConfig::validate`].
    /// - [`Error::Spawn`] if the OS refuses a thread. Threads spawned before
    ///   the failure are stopped and joined before returning.
    pub fn new<T>(config: PoolConfig, transform: T) -> Result<Self>
    where
        T: Transform<In, Out>,
    {
        config.validate()?;

        let (queue_tx, queue_rx) = bounded(config.queue_capacity);
        let (results_tx, results_rx) = bounded(config.result_capacity);
        let transform: Arc<dyn Transform<In, Out>> = Arc::new(transform);
        let shared = Arc::new(Shared {
            queue: RwLock::new(Some(queue_tx)),
            stop: StopSignal::new(),
            stats: PoolStats::new(config.workers),
        });

        let mut handles = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let worker = Worker {
                id,
                queue: queue_rx.clone(),
                results: results_tx.clone(),
                transform: Arc::clone(&transform),
                shared: Arc::clone(&shared),
            };

            let spawned = std::thread::Builder::new()
                .name(format!("sluice-worker-{id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to spawn worker {id}: {e}");
                    for never in id..config.workers {
                        shared.stats.worker_never_started(never);
                    }
                    shared.stop.raise();
                    shared.close_queue();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(Error::Spawn {
                        context: format!("worker {id}: {e}"),
                    });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Started thread pool with {} workers (queue {}, results {}, {:?})",
            config.workers,
            config.queue_capacity,
            config.result_capacity,
            config.delivery
        );

        Ok(Self {
            config,
            shared,
            queue_rx,
            results_tx: Mutex::new(Some(results_tx)),
            results_rx: Mutex::new(Some(results_rx)),
            handles: Mutex::new(handles),
            next_seq: Mutex::new(0),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Enqueues a job and returns its sequence number.
    ///
    /// Blocks while the queue is full. A submitter blocked this way is woken
    /// by a fast stop and receives [`Error::ClosedQueue`]. Sequence numbers
    /// are only consumed by accepted jobs, so they stay contiguous.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClosedQueue`] if the queue has been closed by
    /// `shutdown`, or because every worker stopped on a fatal error.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub fn submit(&self, payload: In) -> Result<u64> {
        let queue = self.shared.queue.read();
        let Some(tx) = queue.as_ref() else {
            return Err(Error::ClosedQueue);
        };

        // Held across the send: the next number is only taken once the job
        // is in the queue.
        let mut next_seq = self.next_seq.lock();
        if self.shared.stop.is_raised() {
            return Err(Error::ClosedQueue);
        }

        let seq = *next_seq;
        let job = Job::new(seq, payload);

        // Fast path: skip the select when there is room.
        let sent = match tx.try_send(job) {
            Ok(()) => true,
            Err(e) if e.is_disconnected() => false,
            Err(e) => select! {
                send(tx, e.into_inner()) -> res => res.is_ok(),
                recv(self.shared.stop.waker()) -> _ => false,
            },
        };
        if !sent {
            return Err(Error::ClosedQueue);
        }

        *next_seq += 1;
        self.shared.stats.record_submitted();
        Ok(seq)
    }

    /// Stops the pool and blocks until the result sink is closed.
    ///
    /// With `drain = true` every job already submitted is processed. With
    /// `drain = false` only jobs already held by a worker are finished; the
    /// rest are reported as [`JobError::Cancelled`].
    ///
    /// Outcomes must be consumed concurrently if more than
    /// `result_capacity` of them can be pending, otherwise workers block on
    /// the full sink and this call never returns.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyShutdown`] on any call after the first.
    /// - [`Error::WorkerJoin`] if a worker thread died outside the transform.
    ///   The sink is still closed.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn shutdown(&self, drain: bool) -> Result<()> {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyShutdown);
        }

        if drain {
            #[cfg(feature = "tracing")]
            tracing::info!("Draining thread pool");
        } else {
            #[cfg(feature = "tracing")]
            tracing::info!("Stopping thread pool");
            self.shared.stop.raise();
        }
        self.shared.close_queue();

        let handles = core::mem::take(&mut *self.handles.lock());
        let mut join_error = None;
        for (id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {id} terminated abnormally");
                join_error = Some(Error::WorkerJoin {
                    context: format!("worker {id} panicked outside its transform"),
                });
            }
        }

        // Workers are gone; whatever is left in the queue was never taken.
        if let Some(results_tx) = self.results_tx.lock().take() {
            while let Ok(job) = self.queue_rx.try_recv() {
                let outcome = Outcome::err(job.seq, JobError::Cancelled);
                self.shared.stats.record_outcome(&outcome.result);
                let _ = results_tx.send(outcome);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Thread pool shutdown complete");

        join_error.map_or(Ok(()), Err)
    }

    /// Takes the outcome sequence.
    ///
    /// The returned iterator blocks for each element and ends once the pool
    /// has shut down and every outcome has been yielded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultsTaken`] if called more than once.
    pub fn results(&self) -> Result<Results<Out>> {
        let rx = self.results_rx.lock().take().ok_or(Error::ResultsTaken)?;
        Ok(Results::new(
            rx,
            Sequencer::new(self.config.delivery, self.config.reorder_window),
        ))
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn live_workers(&self) -> usize {
        self.shared.stats.live_workers()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.shared.stats.worker_states()
    }

    /// Returns `true` if a worker has been lost to a fatal error.
    pub fn is_degraded(&self) -> bool {
        self.stats().is_degraded()
    }

    /// Returns `true` once the job queue no longer accepts submissions.
    pub fn is_closed(&self) -> bool {
        self.shared.queue.read().is_none()
    }
}

impl<In, Out> Drop for ThreadPool<In, Out> {
    fn drop(&mut self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        // Detach rather than join; workers exit after their in-flight job.
        #[cfg(feature = "tracing")]
        tracing::debug!("Thread pool dropped without shutdown, stopping workers");
        self.shared.stop.raise();
        self.shared.close_queue();
        self.results_tx.lock().take();
    }
}
