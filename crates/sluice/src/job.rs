use crate::JobError;

/// A unit of work travelling through the job queue.
///
/// The sequence number is assigned by the pool at submission time and is
/// strictly increasing per pool. It is what ordered delivery sorts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<In> {
    pub seq: u64,
    pub payload: In,
}

impl<In> Job<In> {
    pub const fn new(seq: u64, payload: In) -> Self {
        Self { seq, payload }
    }
}

/// The result of processing one [`Job`].
///
/// Every submitted job produces exactly one `Outcome`, whether it succeeded,
/// failed, or was cancelled before a worker picked it up.
///
/// ```
/// use sluice::{JobError, Outcome};
///
/// let ok: Outcome<u32> = Outcome::ok(0, 42);
/// assert!(ok.is_ok());
///
/// let cancelled: Outcome<u32> = Outcome::err(1, JobError::Cancelled);
/// assert_eq!(cancelled.into_result(), Err(JobError::Cancelled));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<Out> {
    /// Sequence number of the originating job.
    pub seq: u64,
    pub result: Result<Out, JobError>,
}

impl<Out> Outcome<Out> {
    pub const fn ok(seq: u64, value: Out) -> Self {
        Self {
            seq,
            result: Ok(value),
        }
    }

    pub const fn err(seq: u64, error: JobError) -> Self {
        Self {
            seq,
            result: Err(error),
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub const fn is_err(&self) -> bool {
        self.result.is_err()
    }

    pub fn into_result(self) -> Result<Out, JobError> {
        self.result
    }

    /// Returns the value if the job succeeded.
    pub fn ok_value(self) -> Option<Out> {
        self.result.ok()
    }
}
