//! The default error channel of a promise.
//!
//! A `Failure` shares one `anyhow::Error` behind an `Arc`, so it can be
//! handed to every observer of a future and still answer "is this a `K`?"
//! at runtime. That question is what `Future::catch_as` is built on.
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Runtime type inspection of a stored error.
pub trait Inspect {
    /// Returns the error as a `K` if that is its concrete type.
    fn downcast_ref<K: StdError + Send + Sync + 'static>(&self) -> Option<&K>;

    fn is<K: StdError + Send + Sync + 'static>(&self) -> bool {
        self.downcast_ref::<K>().is_some()
    }
}

/// A cloneable `anyhow::Error`.
///
/// Like `anyhow::Error`, `Failure` does not implement `std::error::Error`
/// itself; this is what lets any error convert into it with `?`.
#[derive(Clone)]
pub struct Failure {
    inner: Arc<anyhow::Error>,
}

impl Failure {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from_anyhow(anyhow::Error::new(error))
    }

    /// Wraps a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::from_anyhow(anyhow::Error::msg(message))
    }

    /// Keeps an `anyhow` error as is, context chain included.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        Failure {
            inner: Arc::new(error),
        }
    }

    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl Inspect for Failure {
    fn downcast_ref<K: StdError + Send + Sync + 'static>(&self) -> Option<&K> {
        (*self.inner).downcast_ref::<K>()
    }
}

impl Inspect for Arc<dyn StdError + Send + Sync + 'static> {
    fn downcast_ref<K: StdError + Send + Sync + 'static>(&self) -> Option<&K> {
        (**self).downcast_ref::<K>()
    }
}

impl Inspect for Box<dyn StdError + Send + Sync + 'static> {
    fn downcast_ref<K: StdError + Send + Sync + 'static>(&self) -> Option<&K> {
        (**self).downcast_ref::<K>()
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Failure::new(error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}
