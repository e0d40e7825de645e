// ABOUTME: Deferred values that may not yet be resolvable, polled on demand.
// ABOUTME: Exports the Deferred trait, failure classification and the Eventually evaluator.

mod adapters;
mod attribute;
mod ensure;
mod error;
pub mod sequence;
mod timeout;

pub use adapters::{AsyncPredicate, AtomicFlag, DeferredPredicate, FromFn, Value, from_fn};
pub use attribute::{ChannelError, DeferredAttribute, ManagementChannel};
pub use ensure::{AssertionError, Eventually, ensure, ensure_interruptible};
pub use error::{BoxError, EnsureError, Unavailable};
pub use timeout::{RetryDelays, TimeoutConstraint};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A value that may not yet be available.
///
/// Each call to [`get`](Deferred::get) re-queries live state. Implementations
/// never cache a resolved value between calls, so a `Deferred` can be polled
/// repeatedly by [`ensure`] until the underlying resource is ready.
///
/// The `Display` implementation names the deferred in failure messages.
#[async_trait]
pub trait Deferred<T: Send>: fmt::Display + Send + Sync {
    /// Attempt to resolve the value right now.
    async fn get(&self) -> Result<T, Unavailable>;
}

#[async_trait]
impl<T, D> Deferred<T> for Arc<D>
where
    T: Send,
    D: Deferred<T> + ?Sized,
{
    async fn get(&self) -> Result<T, Unavailable> {
        (**self).get().await
    }
}
