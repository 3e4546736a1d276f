//! A single-assignment promise and the future that observes it.
//!
//! A [`Promise`] is completed exactly once, with a value or an error, from any
//! thread. Every [`Future`] derived from it sees that same result, either by
//! registering awaiters or by blocking until it arrives.
//!
//! Awaiters run synchronously on the thread that completes the promise, or on
//! the registering thread when the future is already complete. Keep them
//! short: the producer is blocked for as long as they run. Use
//! [`Future::via`] with a [`Dispatch`] strategy to move them elsewhere.
//!
//! # Examples
//!
//! ```
//! use promise_cell::{Failure, Promise};
//! use std::thread;
//!
//! let promise = Promise::<u32, Failure>::new();
//! let doubled = promise.future().map(|n| n * 2);
//!
//! let producer = thread::spawn(move || promise.complete(21));
//! assert_eq!(doubled.blocking_await().unwrap(), 42);
//! producer.join().unwrap().unwrap();
//! ```
use std::time::Duration;
use thiserror::Error;

mod cell;
pub mod combinator;
pub mod dispatch;
mod failure;
mod future;
mod promise;

pub use combinator::flatten;
pub use dispatch::{Dispatch, Inline, Job, ThreadPerJob};
pub use failure::{Failure, Inspect};
pub use future::{Future, Wait};
pub use promise::Promise;

/// A promise was completed a second time.
///
/// The first result stays in place and no awaiter runs again.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("promise already completed")]
pub struct AlreadyCompleted;

/// Why a blocking or asynchronous wait did not produce a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError<E> {
    /// The producer failed the promise.
    #[error("future failed: {0}")]
    Failed(E),
    /// No result arrived before the deadline.
    #[error("timed out after {0:?} waiting for completion")]
    Timeout(Duration),
    #[error("promise dropped without being completed")]
    ProducerDropped,
}

impl<E> WaitError<E> {
    /// The producer's error, if that is what ended the wait.
    pub fn into_failure(self) -> Option<E> {
        match self {
            WaitError::Failed(error) => Some(error),
            _ => None,
        }
    }
}
