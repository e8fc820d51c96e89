//! Bounded worker pools with typed job and result channels.
//!
//! A pool runs a fixed number of workers that apply one user-supplied
//! transform to every submitted job. Jobs travel through a bounded queue and
//! outcomes through a bounded result sink, so a fast producer is slowed down
//! instead of exhausting memory.
//!
//! ## Key Concepts
//! - **Backpressure**: `submit` blocks while the queue is full and workers
//!   block while the result sink is full.
//! - **Exactly one outcome per job**: every accepted job yields one
//!   [`Outcome`], including jobs cancelled by a fast stop.
//! - **Delivery modes**: outcomes arrive in completion order, or in
//!   submission order through a bounded reorder buffer.
//! - **Cooperative cancellation**: a stop is honoured between jobs, never in
//!   the middle of a transform.
//! - **Fault isolation**: a fatal transform error or panic stops only the
//!   worker that hit it. The pool keeps running in a degraded state.
//!
//! ## Flavours
//! - [`ThreadPool`] (feature `thread`, default): OS threads over
//!   `crossbeam-channel`.
//! - [`TaskPool`] (feature `async-tokio`): Tokio tasks over `async-channel`.

mod config;
mod error;
mod job;
#[cfg(feature = "async-tokio")]
mod runtime;
mod sequencer;
mod stats;
#[cfg(feature = "thread")]
mod thread;
mod transform;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::job::*;
#[cfg(feature = "async-tokio")]
pub use crate::runtime::*;
pub use crate::stats::*;
#[cfg(feature = "thread")]
pub use crate::thread::*;
pub use crate::transform::*;
