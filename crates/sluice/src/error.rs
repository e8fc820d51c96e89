//! Error types for worker pools.
//!
//! Two families of errors exist and they never mix:
//!
//! - [`Error`] is returned from pool operations (`new`, `submit`, `shutdown`,
//!   `results`). These are configuration or usage failures and are surfaced
//!   immediately at the call that violated the contract.
//! - [`JobError`] is data. It travels through the outcome stream inside an
//!   [`Outcome`](crate::Outcome) and never interrupts the caller's control
//!   flow.

/// A result type defaulting to the pool-level [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Pool-level errors returned by controller operations.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Construction parameters were rejected. No pool was created.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// The job queue no longer accepts work.
    #[error("Job queue is closed")]
    ClosedQueue,

    /// `shutdown` was called more than once.
    #[error("Pool is already shut down")]
    AlreadyShutdown,

    /// The outcome sequence was already handed out.
    #[error("Results have already been taken")]
    ResultsTaken,

    /// A worker thread could not be spawned by the OS.
    #[error("Failed to spawn worker: {context}")]
    Spawn { context: String },

    /// A worker terminated abnormally and could not be joined.
    #[error("Failed to join worker: {context}")]
    WorkerJoin { context: String },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Per-job failures delivered through the outcome stream.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum JobError {
    /// The transform rejected this job. The worker kept running.
    #[error("Job failed: {reason}")]
    Failed { reason: String },

    /// The transform reported a fatal condition. The worker that ran this job
    /// has stopped.
    #[error("Job failed fatally: {reason}")]
    Fatal { reason: String },

    /// The transform panicked. Treated like [`JobError::Fatal`].
    #[error("Job panicked: {reason}")]
    Panicked { reason: String },

    /// The job was still queued when a fast stop was requested and was never
    /// handed to a worker.
    #[error("Job cancelled before processing")]
    Cancelled,

    /// Ordered delivery could not hold this outcome without exceeding the
    /// reorder window. The outcome was released early and its value dropped.
    #[error("Reorder window of {window} exceeded")]
    ReorderOverflow { window: usize },
}

impl JobError {
    /// Returns `true` if the worker that produced this error has stopped.
    pub const fn stopped_worker(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Panicked { .. })
    }
}

/// Error returned by user transforms, classified as recoverable or fatal.
///
/// A [`TransformError::Failed`] only fails the current job. A
/// [`TransformError::Fatal`] additionally stops the worker that ran it, which
/// is how resource exhaustion and similar conditions should be reported.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    #[error("{reason}")]
    Failed { reason: String },

    #[error("fatal: {reason}")]
    Fatal { reason: String },
}

impl TransformError {
    /// A recoverable, per-job failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// A failure that stops the worker.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

impl From<TransformError> for JobError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Failed { reason } => Self::Failed { reason },
            TransformError::Fatal { reason } => Self::Fatal { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_error_classification() {
        assert!(!TransformError::failed("bad input").is_fatal());
        assert!(TransformError::fatal("out of memory").is_fatal());
    }

    #[test]
    fn transform_error_maps_to_job_error() {
        let err: JobError = TransformError::failed("bad input").into();
        assert_eq!(
            err,
            JobError::Failed {
                reason: "bad input".into()
            }
        );
        assert!(!err.stopped_worker());

        let err: JobError = TransformError::fatal("oom").into();
        assert!(err.stopped_worker());
        assert_eq!(err.to_string(), "Job failed fatally: oom");
    }

    #[test]
    fn error_display() {
        assert_eq!(Error::ClosedQueue.to_string(), "Job queue is closed");
        assert_eq!(
            Error::invalid_config("workers must be at least 1").to_string(),
            "Invalid config: workers must be at least 1"
        );
    }
}
