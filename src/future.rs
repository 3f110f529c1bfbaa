//! Single-assignment result handles for asynchronous git operations
//!
//! A [`GitFuture`] is created pending together with its [`Resolver`]. The
//! resolver is consumed by [`Resolver::resolve`], so an outcome is assigned at
//! most once; dropping it unresolved settles the future as
//! [`GitError::Abandoned`], so every future settles exactly once.
//!
//! Futures are multicast: clones share the outcome, `.await` reads it, and
//! [`GitFuture::on_ready`] runs a continuation whether it is attached before or
//! after resolution.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::{Future, IntoFuture};
use tokio::sync::watch;

use crate::git::GitError;

pub type GitResult<T> = Result<T, GitError>;

type Slot<T> = Option<GitResult<T>>;

/// Write side of a [`GitFuture`]
pub struct Resolver<T> {
    tx: watch::Sender<Slot<T>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, outcome: GitResult<T>) {
        self.tx.send_replace(Some(outcome));
    }

    pub fn succeed(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn fail(self, error: GitError) {
        self.resolve(Err(error));
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &self.tx.borrow().is_some())
            .finish()
    }
}

/// How a caller wants to hear about an outcome
pub enum Completion<T> {
    /// Invoked once with the outcome
    Callback(Box<dyn FnOnce(GitResult<T>) + Send>),
    /// A promise the caller created up front; it receives the same outcome
    Resolver(Resolver<T>),
}

impl<T> Completion<T> {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(GitResult<T>) + Send + 'static,
    {
        Completion::Callback(Box::new(f))
    }
}

impl<T> From<Resolver<T>> for Completion<T> {
    fn from(resolver: Resolver<T>) -> Self {
        Completion::Resolver(resolver)
    }
}

/// Read side of a pending git operation
pub struct GitFuture<T> {
    rx: watch::Receiver<Slot<T>>,
}

impl<T> Clone for GitFuture<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> GitFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn pending() -> (Resolver<T>, Self) {
        let (tx, rx) = watch::channel(None);
        (Resolver { tx }, Self { rx })
    }

    /// A future that is already settled
    pub fn ready(outcome: GitResult<T>) -> Self {
        let (resolver, future) = Self::pending();
        resolver.resolve(outcome);
        future
    }

    /// Drive `work` as a task on the ambient tokio runtime and settle with its result.
    ///
    /// Must be called from within a runtime. The task makes progress only while
    /// the runtime is being driven.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = GitResult<T>> + Send + 'static,
    {
        let (resolver, future) = Self::pending();
        tokio::spawn(async move {
            resolver.resolve(work.await);
        });
        future
    }

    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The outcome, if already known; never waits
    pub fn peek(&self) -> Option<GitResult<T>> {
        self.rx.borrow().clone()
    }

    /// Wait for the outcome
    pub async fn wait(mut self) -> GitResult<T> {
        let outcome = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map(|slot| (*slot).clone());
        outcome.ok().flatten().unwrap_or(Err(GitError::Abandoned))
    }

    /// Run `callback` exactly once with the outcome.
    ///
    /// A settled future runs it immediately on the calling thread; otherwise it
    /// runs on the ambient runtime once the outcome arrives.
    pub fn on_ready<F>(self, callback: F) -> Self
    where
        F: FnOnce(GitResult<T>) + Send + 'static,
    {
        if let Some(outcome) = self.peek() {
            callback(outcome);
        } else {
            let pending = self.clone();
            tokio::spawn(async move {
                callback(pending.wait().await);
            });
        }
        self
    }

    /// Deliver the outcome to `completion` and hand this future back.
    ///
    /// With [`Completion::Resolver`] the returned value is this future, not the
    /// caller's handle; the caller's handle paired with that resolver settles
    /// with the same outcome, so either can be awaited.
    pub fn attach(self, completion: Completion<T>) -> Self {
        match completion {
            Completion::Callback(callback) => self.on_ready(callback),
            Completion::Resolver(resolver) => self.on_ready(move |outcome| resolver.resolve(outcome)),
        }
    }

    /// Derive a future from the success value; failures pass through untouched
    pub fn map_ok<U, F>(self, f: F) -> GitFuture<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> GitResult<U> + Send + 'static,
    {
        GitFuture::spawn(async move { self.wait().await.and_then(f) })
    }
}

impl<T> IntoFuture for GitFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = GitResult<T>;
    type IntoFuture = BoxFuture<'static, GitResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

impl<T> fmt::Debug for GitFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.rx.borrow() {
            None => "pending",
            Some(Ok(_)) => "succeeded",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("GitFuture").field("state", &state).finish()
    }
}
