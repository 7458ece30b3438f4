use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::FieldError;
use crate::field::FieldValue;

/// A field value that is not ready yet.
///
/// The wrapped future is not polled until the resolution engine drains its pending queue,
/// after the synchronous pass over the current level completed. Forcing it may produce
/// another `LazyValue`, which is queued again.
pub struct LazyValue {
    future: BoxFuture<'static, Result<FieldValue, FieldError>>,
}

impl LazyValue {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<FieldValue, FieldError>> + Send + 'static,
    {
        Self {
            future: future.boxed(),
        }
    }

    /// Defers a synchronous computation to the drain step.
    pub fn from_fn<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Result<FieldValue, FieldError> + Send + 'static,
    {
        Self::new(async move { thunk() })
    }

    pub(crate) fn force(self) -> BoxFuture<'static, Result<FieldValue, FieldError>> {
        self.future
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyValue")
    }
}
