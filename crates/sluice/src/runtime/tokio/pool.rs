//! Asynchronous worker pool backed by Tokio tasks.
//!
//! This module defines [`TaskPool`], the async counterpart of
//! [`ThreadPool`](crate::ThreadPool). Workers are spawned onto the ambient
//! Tokio runtime and share one bounded [`async_channel`] job queue and one
//! bounded result sink. Cancellation uses a shared [`CancellationToken`]
//! which every worker selects on while waiting for its next job.
//!
//! ## Capacities
//!
//! `async-channel` has no rendezvous mode, so a configured capacity of 0 is
//! raised to 1 for both the queue and the sink.
//!
//! ## Cancel safety
//!
//! Dropping a [`TaskPool::submit`] future before it resolves enqueues
//! nothing and consumes no sequence number. Dropping a
//! [`TaskPool::shutdown`] future leaves the shutdown running in the
//! background; the outcome stream still ends once it completes.

use super::{ResultStream, worker::Worker};
use crate::{
    AsyncTransform, Error, Job, JobError, Outcome, PoolConfig, PoolStats, Result, StatsSnapshot,
    WorkerState, sequencer::Sequencer,
};
use async_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::{runtime::Handle, sync::Mutex as AsyncMutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// State shared between the controller and every worker task.
pub(crate) struct Shared<In> {
    pub(crate) queue: Sender<Job<In>>,
    pub(crate) stop: CancellationToken,
    pub(crate) stats: PoolStats,
}

/// A fixed-size pool of Tokio tasks applying an [`AsyncTransform`] to jobs.
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use sluice::{DeliveryMode, PoolConfig, TaskPool, TransformError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = PoolConfig::default()
///     .with_workers(3)
///     .with_delivery(DeliveryMode::Ordered);
/// let pool = TaskPool::new(config, |x: u64| async move {
///     Ok::<_, TransformError>(x * 2)
/// })
/// .unwrap();
///
/// for n in 1..=5 {
///     pool.submit(n).await.unwrap();
/// }
/// pool.shutdown(true).await.unwrap();
///
/// let doubled: Vec<u64> = pool
///     .results()
///     .unwrap()
///     .filter_map(|outcome| async move { outcome.ok_value() })
///     .collect()
///     .await;
/// assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
/// # }
/// ```
pub struct TaskPool<In, Out> {
    config: PoolConfig,
    shared: Arc<Shared<In>>,
    queue_rx: Receiver<Job<In>>,
    results_tx: Mutex<Option<Sender<Outcome<Out>>>>,
    results_rx: Mutex<Option<Receiver<Outcome<Out>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    runtime: Handle,
    /// Next sequence number, locked for the whole send.
    next_seq: AsyncMutex<u64>,
    shutdown: AtomicBool,
}

impl<In, Out> TaskPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Validates `config` and spawns `config.workers` tasks on the current
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the config fails
    ///   [`PoolConfig::validate`].
    /// - [`Error::Spawn`] if called outside a Tokio runtime.
    pub fn new<T>(config: PoolConfig, transform: T) -> Result<Self>
    where
        T: AsyncTransform<In, Out>,
    {
        config.validate()?;

        let handle = Handle::try_current().map_err(|e| Error::Spawn {
            context: format!("no Tokio runtime: {e}"),
        })?;

        let (queue_tx, queue_rx) = bounded(config.queue_capacity.max(1));
        let (results_tx, results_rx) = bounded(config.result_capacity.max(1));
        let transform: Arc<dyn AsyncTransform<In, Out>> = Arc::new(transform);
        let shared = Arc::new(Shared {
            queue: queue_tx,
            stop: CancellationToken::new(),
            stats: PoolStats::new(config.workers),
        });

        let handles = (0..config.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue_rx.clone(),
                    results: results_tx.clone(),
                    transform: Arc::clone(&transform),
                    shared: Arc::clone(&shared),
                };
                handle.spawn(worker.run())
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Started task pool with {} workers (queue {}, results {}, {:?})",
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
            runtime: handle,
            next_seq: AsyncMutex::new(0),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Enqueues a job and returns its sequence number.
    ///
    /// Suspends while the queue is full. A submitter suspended this way is
    /// woken by a fast stop and receives [`Error::ClosedQueue`]. Sequence
    /// numbers are only consumed by accepted jobs, so they stay contiguous
    /// even when a pending `submit` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClosedQueue`] if the queue has been closed by
    /// `shutdown`, or because every worker stopped on a fatal error.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn submit(&self, payload: In) -> Result<u64> {
        if self.shared.stop.is_cancelled() || self.shared.queue.is_closed() {
            return Err(Error::ClosedQueue);
        }

        tokio::select! {
            biased;
            () = self.shared.stop.cancelled() => Err(Error::ClosedQueue),
            res = self.enqueue(payload) => res,
        }
    }

    async fn enqueue(&self, payload: In) -> Result<u64> {
        let mut next_seq = self.next_seq.lock().await;
        let seq = *next_seq;
        self.shared
            .queue
            .send(Job::new(seq, payload))
            .await
            .map_err(|_| Error::ClosedQueue)?;

        *next_seq += 1;
        self.shared.stats.record_submitted();
        Ok(seq)
    }

    /// Stops the pool and waits until the result sink is closed.
    ///
    /// With `drain = true` every job already submitted is processed. With
    /// `drain = false` only jobs already held by a worker are finished; the
    /// rest are reported as [`JobError::Cancelled`].
    ///
    /// Outcomes must be consumed concurrently if more than
    /// `result_capacity` of them can be pending.
    ///
    /// Cancel safe: the joining and the final sink close run on a detached
    /// task, so dropping this future does not leave the outcome stream open.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyShutdown`] on any call after the first.
    /// - [`Error::WorkerJoin`] if a worker task panicked outside its
    ///   transform. The sink is still closed.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn shutdown(&self, drain: bool) -> Result<()> {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyShutdown);
        }

        if drain {
            #[cfg(feature = "tracing")]
            tracing::info!("Draining task pool");
        } else {
            #[cfg(feature = "tracing")]
            tracing::info!("Stopping task pool");
            self.shared.stop.cancel();
        }
        self.shared.queue.close();

        let handles = core::mem::take(&mut *self.handles.lock());
        let results_tx = self.results_tx.lock().take();
        let finisher = self.runtime.spawn(finish(
            handles,
            results_tx,
            self.queue_rx.clone(),
            Arc::clone(&self.shared),
        ));

        finisher.await.map_err(|e| Error::WorkerJoin {
            context: format!("shutdown task: {e}"),
        })?
    }

    /// Takes the outcome stream.
    ///
    /// The stream ends once the pool has shut down and every outcome has
    /// been yielded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultsTaken`] if called more than once.
    pub fn results(&self) -> Result<ResultStream<Out>> {
        let rx = self.results_rx.lock().take().ok_or(Error::ResultsTaken)?;
        Ok(ResultStream::new(
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
        self.shared.queue.is_closed()
    }
}

/// Joins every worker, reports jobs left in the queue as cancelled, then
/// drops the controller's handle on the sink.
async fn finish<In, Out>(
    handles: Vec<JoinHandle<()>>,
    results_tx: Option<Sender<Outcome<Out>>>,
    queue_rx: Receiver<Job<In>>,
    shared: Arc<Shared<In>>,
) -> Result<()> {
    let mut join_error = None;
    for (id, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker {id} terminated abnormally: {e}");
            join_error = Some(Error::WorkerJoin {
                context: format!("worker {id}: {e}"),
            });
        }
    }

    // Workers are gone; whatever is left in the queue was never taken.
    if let Some(results_tx) = results_tx {
        while let Ok(job) = queue_rx.try_recv() {
            let outcome = Outcome::err(job.seq, JobError::Cancelled);
            shared.stats.record_outcome(&outcome.result);
            let _ = results_tx.send(outcome).await;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Task pool shutdown complete");

    join_error.map_or(Ok(()), Err)
}

impl<In, Out> Drop for TaskPool<In, Out> {
    fn drop(&mut self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        // Tasks are detached; each exits after its in-flight job.
        #[cfg(feature = "tracing")]
        tracing::debug!("Task pool dropped without shutdown, stopping workers");
        self.shared.stop.cancel();
        self.shared.queue.close();
        self.results_tx.lock().take();
    }
}
