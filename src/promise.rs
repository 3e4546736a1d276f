use std::fmt;
use std::sync::Arc;

use crate::cell::{Cell, Status};
use crate::{AlreadyCompleted, Failure, Future};

/// The producer side of a single-assignment result.
///
/// Exactly one of [`complete`](Promise::complete) or [`fail`](Promise::fail)
/// should be called, once. A second attempt returns [`AlreadyCompleted`] and
/// leaves the first result in place. Dropping a promise that was never
/// completed releases its waiters with
/// [`WaitError::ProducerDropped`](crate::WaitError::ProducerDropped); its
/// awaiters are discarded without being called.
///
/// # Examples
///
/// ```
/// use promise_cell::{Promise, WaitError};
/// use std::thread;
///
/// let (promise, future) = Promise::<String, String>::pair();
/// let consumer = future.clone();
/// let task = thread::spawn(move || consumer.blocking_await());
///
/// promise.complete("Hi".into()).unwrap();
/// assert_eq!(task.join().unwrap(), Ok("Hi".to_string()));
/// assert_eq!(promise.fail("late".into()), Err(promise_cell::AlreadyCompleted));
/// assert_eq!(future.blocking_await(), Ok::<_, WaitError<String>>("Hi".to_string()));
/// ```
pub struct Promise<T, E = Failure> {
    cell: Arc<Cell<T, E>>,
}

impl<T, E> Promise<T, E> {
    pub fn new() -> Self {
        Promise {
            cell: Arc::new(Cell::pending()),
        }
    }

    /// A fresh promise together with its future.
    pub fn pair() -> (Self, Future<T, E>) {
        let promise = Self::new();
        let future = promise.future();
        (promise, future)
    }

    /// The future observing this promise. Every call views the same cell.
    pub fn future(&self) -> Future<T, E> {
        Future::from_cell(self.cell.clone())
    }

    /// Settle the promise with a value, running every queued awaiter on
    /// this thread before returning.
    pub fn complete(&self, value: T) -> Result<(), AlreadyCompleted> {
        self.settle(Ok(value))
    }

    /// Settle the promise with an error.
    pub fn fail(&self, error: E) -> Result<(), AlreadyCompleted> {
        self.settle(Err(error))
    }

    pub fn settle(&self, result: Result<T, E>) -> Result<(), AlreadyCompleted> {
        self.cell.try_transition(result).map_err(|err| {
            tracing::warn!("rejected a second completion of a settled promise");
            err
        })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.cell.status(), Status::Settled(_))
    }
}

impl<T, E> Default for Promise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Drop for Promise<T, E> {
    /// If this promise was never settled, release everyone waiting on it.
    fn drop(&mut self) {
        self.cell.abandon();
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.is_completed())
            .finish()
    }
}
