// ABOUTME: Small Deferred implementations: known values, async closures, predicates and flags.
// ABOUTME: Used by the assertion API and by cluster actions to express preconditions.

use super::{Deferred, Unavailable};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An already-known value.
#[derive(Debug, Clone)]
pub struct Value<T>(pub T);

impl<T: fmt::Debug> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value{{{:?}}}", self.0)
    }
}

#[async_trait]
impl<T> Deferred<T> for Value<T>
where
    T: Clone + fmt::Debug + Send + Sync,
{
    async fn get(&self) -> Result<T, Unavailable> {
        Ok(self.0.clone())
    }
}

/// A deferred backed by an async closure, re-invoked on every attempt.
pub struct FromFn<F> {
    description: String,
    f: F,
}

/// Wrap an async closure as a [`Deferred`].
///
/// ```
/// use foreman::deferred::{Deferred, Unavailable, from_fn};
///
/// # tokio_test_block_on(async {
/// let answer = from_fn("answer", || async { Ok::<_, Unavailable>(42) });
/// assert_eq!(answer.get().await.unwrap(), 42);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub fn from_fn<F>(description: impl Into<String>, f: F) -> FromFn<F> {
    FromFn {
        description: description.into(),
        f,
    }
}

impl<F> fmt::Display for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred<{}>", self.description)
    }
}

#[async_trait]
impl<T, F, Fut> Deferred<T> for FromFn<F>
where
    T: Send,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Unavailable>> + Send + 'static,
{
    async fn get(&self) -> Result<T, Unavailable> {
        (self.f)().await
    }
}

/// An async predicate over a shared subject.
pub type AsyncPredicate<M> = Arc<dyn Fn(Arc<M>) -> BoxFuture<'static, Result<bool, Unavailable>> + Send + Sync>;

/// Resolves to `true` once the predicate holds for the subject.
///
/// While the predicate does not hold the value is temporarily unavailable.
pub struct DeferredPredicate<M: ?Sized> {
    subject: Arc<M>,
    predicate: AsyncPredicate<M>,
    description: String,
}

impl<M: ?Sized> DeferredPredicate<M> {
    pub fn new(description: impl Into<String>, subject: Arc<M>, predicate: AsyncPredicate<M>) -> Self {
        Self {
            subject,
            predicate,
            description: description.into(),
        }
    }
}

impl<M: ?Sized> fmt::Display for DeferredPredicate<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate<{}>", self.description)
    }
}

#[async_trait]
impl<M> Deferred<bool> for DeferredPredicate<M>
where
    M: ?Sized + Send + Sync + 'static,
{
    async fn get(&self) -> Result<bool, Unavailable> {
        if (self.predicate)(Arc::clone(&self.subject)).await? {
            Ok(true)
        } else {
            Err(Unavailable::temporarily(self))
        }
    }
}

/// Reads a shared boolean flag.
#[derive(Debug, Clone)]
pub struct AtomicFlag {
    name: String,
    flag: Arc<AtomicBool>,
}

impl AtomicFlag {
    pub fn new(name: impl Into<String>, flag: Arc<AtomicBool>) -> Self {
        Self {
            name: name.into(),
            flag,
        }
    }
}

impl fmt::Display for AtomicFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flag<{}>", self.name)
    }
}

#[async_trait]
impl Deferred<bool> for AtomicFlag {
    async fn get(&self) -> Result<bool, Unavailable> {
        Ok(self.flag.load(Ordering::SeqCst))
    }
}
