//! The completion cell shared by a `Promise` and every `Future` derived from
//! it.
//!
//! A cell moves from pending to settled exactly once. Awaiters are appended
//! under the same lock that performs the transition, then fired outside of
//! it, so every awaiter runs exactly once no matter how registration races
//! with settlement.
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::AlreadyCompleted;

pub(crate) type Awaiter<T, E> = Box<dyn FnOnce(&Result<T, E>) + Send + 'static>;

/// What a cell looks like from the outside at one instant.
pub(crate) enum Status<T, E> {
    Pending,
    /// The promise went away without settling; nothing will ever arrive.
    Abandoned,
    Settled(Arc<Result<T, E>>),
}

enum State<T, E> {
    Pending,
    Settled(Arc<Result<T, E>>),
}

struct Inner<T, E> {
    state: State<T, E>,
    awaiters: Vec<Awaiter<T, E>>,
    abandoned: bool,
}

impl<T, E> Inner<T, E> {
    fn status(&self) -> Status<T, E> {
        match self.state {
            State::Settled(ref result) => Status::Settled(result.clone()),
            State::Pending if self.abandoned => Status::Abandoned,
            State::Pending => Status::Pending,
        }
    }
}

pub(crate) struct Cell<T, E> {
    inner: Mutex<Inner<T, E>>,
    settled: Condvar,
}

impl<T, E> Cell<T, E> {
    pub(crate) fn pending() -> Self {
        Cell {
            inner: Mutex::new(Inner {
                state: State::Pending,
                awaiters: vec![],
                abandoned: false,
            }),
            settled: Condvar::new(),
        }
    }

    /// A cell that starts out settled and never passes through pending.
    pub(crate) fn settled(result: Result<T, E>) -> Self {
        Cell {
            inner: Mutex::new(Inner {
                state: State::Settled(Arc::new(result)),
                awaiters: vec![],
                abandoned: false,
            }),
            settled: Condvar::new(),
        }
    }

    /// Store `result` and fire every queued awaiter in registration order.
    ///
    /// Awaiters run on the calling thread after the lock is released. A cell
    /// that is already settled rejects the attempt and keeps its result.
    pub(crate) fn try_transition(&self, result: Result<T, E>) -> Result<(), AlreadyCompleted> {
        let (result, awaiters) = {
            let mut inner = self.inner.lock();
            if let State::Settled(_) = inner.state {
                return Err(AlreadyCompleted);
            }
            let result = Arc::new(result);
            inner.state = State::Settled(result.clone());
            (result, std::mem::take(&mut inner.awaiters))
        };
        self.settled.notify_all();
        tracing::trace!(
            awaiters = awaiters.len(),
            success = result.is_ok(),
            "completion cell settled"
        );
        // A panicking awaiter must not cost the ones queued after it their
        // call; the first panic is re-raised once the queue is drained.
        let mut panicked = None;
        for awaiter in awaiters {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| awaiter(&result))) {
                tracing::warn!("awaiter panicked while the cell was settling");
                panicked.get_or_insert(payload);
            }
        }
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        Ok(())
    }

    /// Queue `awaiter`, or run it right here if the cell is already settled.
    ///
    /// On an abandoned cell the awaiter is dropped without being called.
    pub(crate) fn register(&self, awaiter: Awaiter<T, E>) {
        let mut inner = self.inner.lock();
        match inner.status() {
            Status::Settled(result) => {
                drop(inner);
                awaiter(&result);
            }
            Status::Abandoned => {
                drop(inner);
                drop(awaiter);
            }
            Status::Pending => inner.awaiters.push(awaiter),
        }
    }

    /// Called when the producer is dropped. A settled cell is unaffected.
    pub(crate) fn abandon(&self) {
        let awaiters = {
            let mut inner = self.inner.lock();
            if let State::Settled(_) = inner.state {
                return;
            }
            inner.abandoned = true;
            std::mem::take(&mut inner.awaiters)
        };
        self.settled.notify_all();
        tracing::debug!(
            awaiters = awaiters.len(),
            "promise dropped before completion"
        );
        // Dropping the awaiters may abandon downstream cells in turn, so it
        // happens outside of our lock.
        drop(awaiters);
    }

    pub(crate) fn status(&self) -> Status<T, E> {
        self.inner.lock().status()
    }

    /// Block until the cell leaves pending, or until `deadline` passes.
    ///
    /// Returns `Status::Pending` only when the deadline was hit.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> Status<T, E> {
        let mut inner = self.inner.lock();
        loop {
            match inner.status() {
                Status::Pending => {}
                status => return status,
            }
            match deadline {
                None => self.settled.wait(&mut inner),
                Some(deadline) => {
                    if self.settled.wait_until(&mut inner, deadline).timed_out() {
                        return inner.status();
                    }
                }
            }
        }
    }
}
