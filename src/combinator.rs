//! Combinators over [`Future`].
//!
//! Everything here is built from the same public operations any consumer
//! has: a fresh [`Promise`], [`Future::add_awaiter`], and settling the
//! promise. Each combinator returns a new future backed by its own cell.
//! Its promise lives inside the upstream awaiter, so if an upstream producer
//! is dropped unsettled the output is released with
//! [`WaitError::ProducerDropped`](crate::WaitError::ProducerDropped) too.
use parking_lot::Mutex;
use std::sync::Arc;

use crate::{Dispatch, Future, Promise};

/// Settle a promise the combinator owns outright.
fn fulfil<T, E>(promise: Promise<T, E>, result: Result<T, E>) {
    let settled = promise.settle(result);
    debug_assert!(settled.is_ok(), "combinator promise settled twice");
}

impl<T, E> Future<T, E> {
    /// Transform the value once it arrives. A failure passes through
    /// untouched and `transform` is never called.
    pub fn map<U, F>(&self, transform: F) -> Future<U, E>
    where
        F: FnOnce(&T) -> U + Send + 'static,
        U: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok(transform(value)))
    }

    /// Like [`map`](Future::map), but `transform` may itself fail; its
    /// error becomes the failure of the returned future.
    pub fn try_map<U, F>(&self, transform: F) -> Future<U, E>
    where
        F: FnOnce(&T) -> Result<U, E> + Send + 'static,
        U: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let (promise, future) = Promise::pair();
        self.add_awaiter(move |result| {
            let mapped = match result {
                Ok(value) => transform(value),
                Err(error) => Err(error.clone()),
            };
            fulfil(promise, mapped);
        });
        future
    }

    /// Chain an asynchronous step.
    ///
    /// On success the future returned by `transform` is forwarded, whatever
    /// it eventually holds. On failure `transform` is skipped.
    ///
    /// ```
    /// use promise_cell::{Failure, Future, Promise};
    ///
    /// let lookup = Promise::<u32, Failure>::new();
    /// let user_id = lookup.future();
    /// let name = user_id.flat_map(|id| Future::ready(format!("user-{id}")));
    /// lookup.complete(7).unwrap();
    /// assert_eq!(name.blocking_await().unwrap(), "user-7");
    /// ```
    pub fn flat_map<U, F>(&self, transform: F) -> Future<U, E>
    where
        F: FnOnce(&T) -> Future<U, E> + Send + 'static,
        U: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let (promise, future) = Promise::pair();
        self.add_awaiter(move |result| match result {
            Ok(value) => {
                transform(value).add_awaiter(move |inner| fulfil(promise, inner.clone()))
            }
            Err(error) => fulfil(promise, Err(error.clone())),
        });
        future
    }

    /// Re-settle this future's result through `dispatcher`, so the awaiters
    /// of the returned future run wherever the dispatcher puts them.
    pub fn via<D>(&self, dispatcher: Arc<D>) -> Future<T, E>
    where
        D: Dispatch + ?Sized + 'static,
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let (promise, future) = Promise::pair();
        self.add_awaiter(move |result| {
            let result = result.clone();
            dispatcher.dispatch(Box::new(move || fulfil(promise, result)));
        });
        future
    }
}

impl<T, E> Future<Future<T, E>, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Collapse a future of a future into one future.
    pub fn flatten(&self) -> Future<T, E> {
        self.flat_map(|inner| inner.clone())
    }
}

struct Join<T, E> {
    slots: Vec<Option<T>>,
    remaining: usize,
    promise: Option<Promise<Vec<T>, E>>,
}

/// Wait for every future in `futures`.
///
/// The values come back in input order, whatever order they complete in.
/// The first failure to arrive wins; later results are ignored.
///
/// ```
/// use promise_cell::{flatten, Failure, Future};
///
/// let words = flatten(["Hello", "World"].map(Future::<_, Failure>::ready));
/// assert_eq!(words.blocking_await().unwrap(), vec!["Hello", "World"]);
/// ```
pub fn flatten<T, E, I>(futures: I) -> Future<Vec<T>, E>
where
    I: IntoIterator<Item = Future<T, E>>,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let futures: Vec<_> = futures.into_iter().collect();
    if futures.is_empty() {
        return Future::ready(vec![]);
    }
    let (promise, output) = Promise::pair();
    let join = Arc::new(Mutex::new(Join {
        slots: futures.iter().map(|_| None).collect(),
        remaining: futures.len(),
        promise: Some(promise),
    }));
    for (index, future) in futures.into_iter().enumerate() {
        let join = join.clone();
        future.add_awaiter(move |result| {
            let finished = {
                let mut join = join.lock();
                match result {
                    Ok(value) => {
                        join.slots[index] = Some(value.clone());
                        join.remaining -= 1;
                        if join.remaining == 0 {
                            let values: Vec<T> = join.slots.drain(..).flatten().collect();
                            join.promise.take().map(|promise| (promise, Ok(values)))
                        } else {
                            None
                        }
                    }
                    Err(error) => join
                        .promise
                        .take()
                        .map(|promise| (promise, Err(error.clone()))),
                }
            };
            if let Some((promise, result)) = finished {
                fulfil(promise, result);
            }
        });
    }
    output
}
