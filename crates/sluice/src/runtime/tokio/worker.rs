use super::pool::Shared;
use crate::{AsyncTransform, Job, JobError, Outcome, WorkerState, transform::panicked};
use async_channel::{Receiver, Sender};
use core::panic::AssertUnwindSafe;
use futures::FutureExt;
use std::sync::Arc;

/// A single worker task's view of the pool.
pub(crate) struct Worker<In, Out> {
    pub(crate) id: usize,
    pub(crate) queue: Receiver<Job<In>>,
    pub(crate) results: Sender<Outcome<Out>>,
    pub(crate) transform: Arc<dyn AsyncTransform<In, Out>>,
    pub(crate) shared: Arc<Shared<In>>,
}

impl<In, Out> Worker<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Runs jobs until the queue is closed and drained, the stop token is
    /// observed between jobs, or the transform fails fatally.
    pub(crate) async fn run(self) {
        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {} started", self.id);

        let stats = &self.shared.stats;
        let mut fatal = false;

        loop {
            stats.set_state(self.id, WorkerState::Fetching);

            // Prefer the stop token so a ready queue cannot starve it.
            let job = tokio::select! {
                biased;
                () = self.shared.stop.cancelled() => break,
                msg = self.queue.recv() => match msg {
                    Ok(job) => job,
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!("Worker {} found queue closed and drained", self.id);
                        break;
                    }
                },
            };

            if self.shared.stop.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {} cancelling job {} taken during stop", self.id, job.seq);
                self.emit(Outcome::err(job.seq, JobError::Cancelled)).await;
                break;
            }

            stats.set_state(self.id, WorkerState::Processing);
            let transform = &self.transform;
            let payload = job.payload;
            let processed = AssertUnwindSafe(async move { transform.apply(payload).await })
                .catch_unwind()
                .await;
            let result: Result<Out, JobError> = match processed {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    fatal = e.is_fatal();
                    Err(e.into())
                }
                Err(payload) => {
                    fatal = true;
                    Err(panicked(payload.as_ref()))
                }
            };

            stats.set_state(self.id, WorkerState::Emitting);
            self.emit(Outcome {
                seq: job.seq,
                result,
            })
            .await;

            if fatal {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {} stopping after fatal error on job {}", self.id, job.seq);
                break;
            }
            stats.set_state(self.id, WorkerState::Idle);
        }

        let live = stats.worker_stopped(self.id, fatal);
        if fatal && live == 0 {
            #[cfg(feature = "tracing")]
            tracing::error!("All workers lost to fatal errors, closing the job queue");
            self.shared.stop.cancel();
            self.shared.queue.close();
        } else if fatal {
            #[cfg(feature = "tracing")]
            tracing::warn!("Pool degraded, {} workers remaining", live);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {} stopped", self.id);
    }

    async fn emit(&self, outcome: Outcome<Out>) {
        self.shared.stats.record_outcome(&outcome.result);
        if let Err(_e) = self.results.send(outcome).await {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {} dropped outcome {}: results receiver gone", self.id, _e.0.seq);
        }
    }
}
