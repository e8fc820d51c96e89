use super::pool::Shared;
use crate::{JobError, Outcome, Transform, WorkerState, transform::panicked};
use crossbeam_channel::{Receiver, Sender, select};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

/// A single worker thread's view of the pool.
pub(crate) struct Worker<In, Out> {
    pub(crate) id: usize,
    pub(crate) queue: Receiver<crate::Job<In>>,
    pub(crate) results: Sender<Outcome<Out>>,
    pub(crate) transform: Arc<dyn Transform<In, Out>>,
    pub(crate) shared: Arc<Shared<In>>,
}

impl<In, Out> Worker<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Runs jobs until the queue is closed and drained, the stop signal is
    /// observed between jobs, or the transform fails fatally.
    ///
    /// A job received after the stop signal was raised is not processed; it is
    /// reported as [`JobError::Cancelled`] instead.
    pub(crate) fn run(self) {
        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {} started", self.id);

        let stats = &self.shared.stats;
        let mut fatal = false;

        loop {
            stats.set_state(self.id, WorkerState::Fetching);
            if self.shared.stop.is_raised() {
                break;
            }

            let job = select! {
                recv(self.queue) -> msg => match msg {
                    Ok(job) => job,
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!("Worker {} found queue closed and drained", self.id);
                        break;
                    }
                },
                recv(self.shared.stop.waker()) -> _ => break,
            };

            if self.shared.stop.is_raised() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {} cancelling job {} taken during stop", self.id, job.seq);
                self.emit(Outcome::err(job.seq, JobError::Cancelled));
                break;
            }

            stats.set_state(self.id, WorkerState::Processing);
            let transform = &self.transform;
            let result: Result<Out, JobError> =
                match catch_unwind(AssertUnwindSafe(|| transform.apply(job.payload))) {
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
            });

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
            self.shared.stop.raise();
            self.shared.close_queue();
        } else if fatal {
            #[cfg(feature = "tracing")]
            tracing::warn!("Pool degraded, {} workers remaining", live);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {} stopped", self.id);
    }

    fn emit(&self, outcome: Outcome<Out>) {
        self.shared.stats.record_outcome(&outcome.result);
        if let Err(_e) = self.results.send(outcome) {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {} dropped outcome {}: results receiver gone", self.id, _e.0.seq);
        }
    }
}
