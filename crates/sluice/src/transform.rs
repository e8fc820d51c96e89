//! The user-supplied work function applied to every job.
//!
//! Closures are the common case and get blanket implementations, so
//! `|x: u32| Ok::<_, TransformError>(x * 2)` is a valid [`Transform`]. Named
//! types can implement the traits directly when the transform carries state
//! such as a connection or a cache.

use crate::{JobError, TransformError};
use core::any::Any;

/// A blocking transform run on pool worker threads.
///
/// Invoked exactly once per consumed job. Returning
/// [`TransformError::Fatal`] stops the calling worker after its outcome has
/// been emitted.
pub trait Transform<In, Out>: Send + Sync + 'static {
    /// Processes one job payload.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] classifying the failure as per-job or
    /// fatal to the worker.
    fn apply(&self, input: In) -> Result<Out, TransformError>;
}

impl<F, In, Out> Transform<In, Out> for F
where
    F: Fn(In) -> Result<Out, TransformError> + Send + Sync + 'static,
{
    fn apply(&self, input: In) -> Result<Out, TransformError> {
        self(input)
    }
}

/// An asynchronous transform run on Tokio worker tasks.
#[cfg(feature = "async-tokio")]
pub trait AsyncTransform<In, Out>: Send + Sync + 'static {
    /// Returns a future that processes one job payload.
    fn apply(&self, input: In) -> futures::future::BoxFuture<'static, Result<Out, TransformError>>;
}

#[cfg(feature = "async-tokio")]
impl<F, Fut, In, Out> AsyncTransform<In, Out> for F
where
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, TransformError>> + Send + 'static,
{
    fn apply(&self, input: In) -> futures::future::BoxFuture<'static, Result<Out, TransformError>> {
        Box::pin(self(input))
    }
}

/// Converts a caught panic payload into a [`JobError::Panicked`].
pub(crate) fn panicked(payload: &(dyn Any + Send)) -> JobError {
    let reason = if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    };
    JobError::Panicked { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scale(u32);

    impl Transform<u32, u32> for Scale {
        fn apply(&self, input: u32) -> Result<u32, TransformError> {
            input
                .checked_mul(self.0)
                .ok_or_else(|| TransformError::failed("overflow"))
        }
    }

    fn run<T: Transform<u32, u32>>(t: &T, input: u32) -> Result<u32, TransformError> {
        t.apply(input)
    }

    #[test]
    fn closures_and_types_are_transforms() {
        let double = |x: u32| Ok::<_, TransformError>(x * 2);
        assert_eq!(run(&double, 21), Ok(42));
        assert_eq!(run(&Scale(3), 5), Ok(15));
        assert!(run(&Scale(2), u32::MAX).is_err());
    }

    #[test]
    fn panic_payloads_become_messages() {
        let err = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(
            panicked(err.as_ref()),
            JobError::Panicked {
                reason: "boom".into()
            }
        );

        let err = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(
            panicked(err.as_ref()),
            JobError::Panicked {
                reason: "code 7".into()
            }
        );
    }
}
