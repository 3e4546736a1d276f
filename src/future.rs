use parking_lot::Mutex;
use std::fmt;
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::cell::{Cell, Status};
use crate::{Failure, Inspect, WaitError};

/// The consumer side of a single-assignment result.
///
/// Cloning a future is cheap; every clone observes the same result. A future
/// never exposes the promise behind it.
///
/// # Examples
///
/// ```
/// use promise_cell::{Failure, Future};
///
/// let future = Future::<&str, Failure>::ready("Hello");
/// future
///     .then(|greeting| assert_eq!(*greeting, "Hello"))
///     .catch(|_| unreachable!());
/// assert_eq!(future.blocking_await().unwrap(), "Hello");
/// ```
pub struct Future<T, E = Failure> {
    cell: Arc<Cell<T, E>>,
}

impl<T, E> Future<T, E> {
    pub(crate) fn from_cell(cell: Arc<Cell<T, E>>) -> Self {
        Future { cell }
    }

    /// An already completed future holding `value`.
    pub fn ready(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    /// An already failed future holding `error`.
    pub fn failed(error: E) -> Self {
        Self::from_result(Err(error))
    }

    pub fn from_result(result: Result<T, E>) -> Self {
        Future {
            cell: Arc::new(Cell::settled(result)),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.cell.status(), Status::Settled(_))
    }

    /// The result, if there is one yet. Never blocks.
    pub fn peek(&self) -> Option<Arc<Result<T, E>>> {
        match self.cell.status() {
            Status::Settled(result) => Some(result),
            Status::Pending | Status::Abandoned => None,
        }
    }

    /// Run `awaiter` exactly once with the result.
    ///
    /// If the future is already complete the awaiter runs before this call
    /// returns; otherwise it runs on the thread that completes the promise.
    /// It is never called if the promise is dropped without completing.
    pub fn add_awaiter<F>(&self, awaiter: F)
    where
        F: FnOnce(&Result<T, E>) + Send + 'static,
    {
        self.cell.register(Box::new(awaiter));
    }

    /// Observe the value. Failures are ignored.
    pub fn then<F>(&self, on_success: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.add_awaiter(move |result| {
            if let Ok(value) = result {
                on_success(value)
            }
        });
        self
    }

    /// Observe any failure.
    pub fn catch<F>(&self, on_error: F) -> &Self
    where
        F: FnOnce(&E) + Send + 'static,
    {
        self.add_awaiter(move |result| {
            if let Err(error) = result {
                on_error(error)
            }
        });
        self
    }

    /// Observe failures whose concrete type is `K`.
    ///
    /// Other failures skip this handler and still reach every other `catch`
    /// registered on the future.
    ///
    /// ```
    /// use promise_cell::{Failure, Future};
    /// use std::sync::{Arc, Mutex};
    ///
    /// #[derive(Debug, thiserror::Error)]
    /// #[error("not found")]
    /// struct NotFound;
    ///
    /// let log = Arc::new(Mutex::new(vec![]));
    /// let (a, b) = (log.clone(), log.clone());
    /// Future::<(), Failure>::failed(Failure::msg("io"))
    ///     .catch_as(move |_: &NotFound| a.lock().unwrap().push("not found"))
    ///     .catch(move |e| b.lock().unwrap().push(if e.to_string() == "io" { "io" } else { "?" }));
    /// assert_eq!(*log.lock().unwrap(), vec!["io"]);
    /// ```
    pub fn catch_as<K, F>(&self, on_error: F) -> &Self
    where
        E: Inspect,
        K: std::error::Error + Send + Sync + 'static,
        F: FnOnce(&K) + Send + 'static,
    {
        self.add_awaiter(move |result| {
            if let Err(error) = result {
                if let Some(matched) = error.downcast_ref::<K>() {
                    on_error(matched)
                }
            }
        });
        self
    }

    /// Block the calling thread until the promise is settled.
    pub fn blocking_await(&self) -> Result<T, WaitError<E>>
    where
        T: Clone,
        E: Clone,
    {
        resolve(self.cell.wait(None), Duration::MAX)
    }

    /// Block until the promise is settled or `timeout` elapses.
    ///
    /// A zero timeout checks once and returns straight away.
    pub fn blocked(&self, timeout: Duration) -> Result<T, WaitError<E>>
    where
        T: Clone,
        E: Clone,
    {
        let deadline = Instant::now().checked_add(timeout);
        resolve(self.cell.wait(deadline), timeout)
    }
}

fn resolve<T, E>(status: Status<T, E>, timeout: Duration) -> Result<T, WaitError<E>>
where
    T: Clone,
    E: Clone,
{
    match status {
        Status::Settled(result) => match &*result {
            Ok(value) => Ok(value.clone()),
            Err(error) => Err(WaitError::Failed(error.clone())),
        },
        Status::Abandoned => Err(WaitError::ProducerDropped),
        Status::Pending => Err(WaitError::Timeout(timeout)),
    }
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Future {
            cell: self.cell.clone(),
        }
    }
}

impl<T, E> From<Result<T, E>> for Future<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Future::from_result(result)
    }
}

impl<T, E> fmt::Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.cell.status() {
            Status::Pending => "pending",
            Status::Abandoned => "abandoned",
            Status::Settled(result) if result.is_ok() => "completed",
            Status::Settled(_) => "failed",
        };
        f.debug_struct("Future").field("state", &state).finish()
    }
}

impl<T, E> IntoFuture for Future<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, WaitError<E>>;
    type IntoFuture = Wait<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Wait {
            future: self,
            waker: Arc::new(Mutex::new(None)),
            registered: false,
        }
    }
}

/// `.await`ing a [`Future`] from async code.
///
/// The waker is handed to the promise through an ordinary awaiter, so any
/// executor will do.
pub struct Wait<T, E> {
    future: Future<T, E>,
    waker: Arc<Mutex<Option<Waker>>>,
    registered: bool,
}

/// Wakes the task when the awaiter runs, or when it is dropped unrun
/// because the promise went away.
struct WakeOnDrop(Arc<Mutex<Option<Waker>>>);

impl Drop for WakeOnDrop {
    fn drop(&mut self) {
        let waker = self.0.lock().take();
        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

impl<T, E> std::future::Future for Wait<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, WaitError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        *this.waker.lock() = Some(cx.waker().clone());
        if !this.registered {
            this.registered = true;
            let wake = WakeOnDrop(this.waker.clone());
            this.future.add_awaiter(move |_| drop(wake));
        }
        match this.future.cell.status() {
            Status::Pending => Poll::Pending,
            status => Poll::Ready(resolve(status, Duration::ZERO)),
        }
    }
}
