//! Where awaiters run.
//!
//! By default an awaiter runs on whichever thread completes the promise.
//! A [`Dispatch`] strategy, passed explicitly to
//! [`Future::via`](crate::Future::via), hands that work to somewhere else.
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// A unit of work handed to a dispatcher.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatch: Send + Sync {
    /// Run `job` exactly once, now or later, on any thread.
    fn dispatch(&self, job: Job);
}

/// Runs every job on the calling thread, before `dispatch` returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl Dispatch for Inline {
    fn dispatch(&self, job: Job) {
        job()
    }
}

/// Runs every job on a freshly spawned thread.
#[derive(Debug, Default, Clone)]
pub struct ThreadPerJob {
    name: Option<String>,
}

impl ThreadPerJob {
    /// Name the spawned threads, which shows up in panics and debuggers.
    pub fn named(name: impl Into<String>) -> Self {
        ThreadPerJob {
            name: Some(name.into()),
        }
    }
}

impl Dispatch for ThreadPerJob {
    fn dispatch(&self, job: Job) {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        // A failed spawn drops its closure, so the job lives in a slot we
        // can still reach.
        let slot = Arc::new(Mutex::new(Some(job)));
        let worker = slot.clone();
        let spawned = builder.spawn(move || {
            let job = worker.lock().take();
            if let Some(job) = job {
                job()
            }
        });
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn dispatch thread, running job inline");
            let job = slot.lock().take();
            if let Some(job) = job {
                job()
            }
        }
    }
}
