//! The sequence abstraction.
//!
//! A `Seq<T>` is a *cold* description of a sequence: a shared factory that
//! produces a fresh pull-capable object (an `Iterator` or a `Stream` of
//! `Result<T>`) each time the sequence is consumed. The enum variant is the
//! capability marker; probing it is a plain `match` and cannot fail.
//!
//! Invariants:
//! - Creating or cloning a `Seq` never pulls from anything.
//! - Every consumption gets its own `IterState` and its own per-run state.
//! - A failed pull is `Some(Err(_))`; the sequence may continue afterwards if
//!   the producer does. `None` is terminal.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{PipeError, Result};
use crate::state::IterState;

/// A synchronous pull-capable object.
pub type SyncIter<T> = Box<dyn Iterator<Item = Result<T>> + Send>;
/// An asynchronous pull-capable object.
pub type AsyncIter<T> = BoxStream<'static, Result<T>>;

pub type SyncFactory<T> = Arc<dyn Fn(&IterState) -> SyncIter<T> + Send + Sync>;
pub type AsyncFactory<T> = Arc<dyn Fn(&IterState) -> AsyncIter<T> + Send + Sync>;

/// Result of probing a value for pull capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sync,
    Async,
    /// Neither: a bare value that callers wrap as a single element.
    Value,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Sync => f.write_str("synchronous"),
            Capability::Async => f.write_str("asynchronous"),
            Capability::Value => f.write_str("non-sequence"),
        }
    }
}

/// A lazily attached sequence in one of the two execution modes.
pub enum Seq<T> {
    Sync(SyncFactory<T>),
    Async(AsyncFactory<T>),
}

impl<T> Clone for Seq<T> {
    fn clone(&self) -> Self {
        match self {
            Seq::Sync(f) => Seq::Sync(Arc::clone(f)),
            Seq::Async(f) => Seq::Async(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Seq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Seq").field(&self.capability()).finish()
    }
}

impl<T> Seq<T> {
    pub fn capability(&self) -> Capability {
        match self {
            Seq::Sync(_) => Capability::Sync,
            Seq::Async(_) => Capability::Async,
        }
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, Seq::Sync(_))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Seq::Async(_))
    }
}

impl<T: Send + 'static> Seq<T> {
    /// Build a synchronous sequence from a per-run iterator factory.
    pub fn sync_factory<F>(factory: F) -> Self
    where
        F: Fn(&IterState) -> SyncIter<T> + Send + Sync + 'static,
    {
        Seq::Sync(Arc::new(factory))
    }

    /// Build an asynchronous sequence from a per-run stream factory.
    pub fn async_factory<F>(factory: F) -> Self
    where
        F: Fn(&IterState) -> AsyncIter<T> + Send + Sync + 'static,
    {
        Seq::Async(Arc::new(factory))
    }

    /// Replayable synchronous sequence over a cloneable collection.
    pub fn from_values<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        Seq::sync_factory(move |_| Box::new(items.clone().into_iter().map(Ok)))
    }

    /// Replayable synchronous sequence that may contain failed pulls.
    pub fn from_results<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Result<T>> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        Seq::sync_factory(move |_| Box::new(items.clone().into_iter()))
    }

    /// Synchronous sequence whose iterator is rebuilt by `make` on every run.
    pub fn from_fn<F, I>(make: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Seq::sync_factory(move |_| Box::new(make().into_iter().map(Ok)))
    }

    /// Single-pass synchronous sequence; later runs see it empty.
    pub fn once<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(items.into_iter())));
        Seq::sync_factory(move |_| match take_slot(&slot) {
            Some(iter) => Box::new(iter.map(Ok)),
            None => Box::new(std::iter::empty()),
        })
    }

    /// Asynchronous sequence whose stream is rebuilt by `make` on every run.
    pub fn from_stream_fn<F, S>(make: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        Seq::async_factory(move |_| make().map(Ok).boxed())
    }

    /// Like `from_stream_fn`, for streams that can fail mid-way.
    pub fn from_stream_results<F, S>(make: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        Seq::async_factory(move |_| make().boxed())
    }

    /// Single-pass asynchronous sequence; later runs see it empty.
    pub fn once_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(stream.boxed())));
        Seq::async_factory(move |_| match take_slot(&slot) {
            Some(s) => s.map(Ok).boxed(),
            None => stream::empty().boxed(),
        })
    }

    pub fn empty_sync() -> Self {
        Seq::sync_factory(|_| Box::new(std::iter::empty()))
    }

    pub fn empty_async() -> Self {
        Seq::async_factory(|_| stream::empty().boxed())
    }

    /// Sentinel sequence whose first pull fails with `err`, then ends.
    ///
    /// This is how deferred configuration and mode errors are expressed.
    pub fn failing(capability: Capability, err: PipeError) -> Self {
        match capability {
            Capability::Async => {
                Seq::async_factory(move |_| stream::iter(std::iter::once(Err(err.clone()))).boxed())
            }
            Capability::Sync | Capability::Value => {
                Seq::sync_factory(move |_| Box::new(std::iter::once(Err(err.clone()))))
            }
        }
    }

    /// Attach a synchronous pull capability for an existing run.
    ///
    /// An asynchronous sequence cannot be pulled synchronously; its single
    /// pull reports the mismatch.
    pub fn attach_sync(&self, state: &IterState) -> SyncIter<T> {
        match self {
            Seq::Sync(factory) => factory(state),
            Seq::Async(_) => Box::new(std::iter::once(Err(PipeError::ModeMismatch {
                context: "synchronous pull",
                expected: Capability::Sync,
                found: Capability::Async,
            }))),
        }
    }

    /// Attach an asynchronous pull capability for an existing run.
    pub fn attach_async(&self, state: &IterState) -> AsyncIter<T> {
        match self {
            Seq::Sync(factory) => stream::iter(factory(state)).boxed(),
            Seq::Async(factory) => factory(state),
        }
    }

    /// Start a new run and pull synchronously.
    pub fn iter(&self) -> SyncIter<T> {
        self.attach_sync(&IterState::new())
    }

    /// Start a new run and pull asynchronously (works for both modes).
    pub fn stream(&self) -> AsyncIter<T> {
        self.attach_async(&IterState::new())
    }

    /// Drain a new synchronous run, stopping at the first failed pull.
    pub fn collect_sync(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }

    /// Drain a new asynchronous run, stopping at the first failed pull.
    pub async fn collect_async(&self) -> Result<Vec<T>> {
        self.stream().try_collect().await
    }
}

fn take_slot<S>(slot: &Mutex<Option<S>>) -> Option<S> {
    slot.lock().unwrap_or_else(|p| p.into_inner()).take()
}

/// A value that is either bare or a sequence, as probed by `capability()`.
///
/// Operators that accept "a sequence or a plain value" (`concat`,
/// `default_empty`, `flat_map`, `spread`) take `Item`s.
#[derive(Debug, Clone)]
pub enum Item<T> {
    Value(T),
    Seq(Seq<T>),
}

impl<T> Item<T> {
    pub fn capability(&self) -> Capability {
        match self {
            Item::Value(_) => Capability::Value,
            Item::Seq(seq) => seq.capability(),
        }
    }
}

impl<T> From<Seq<T>> for Item<T> {
    fn from(seq: Seq<T>) -> Self {
        Item::Seq(seq)
    }
}

/// Arbitrarily nested sequences, as consumed by `flat`.
///
/// Each level may independently be synchronous or asynchronous.
#[derive(Debug, Clone)]
pub enum Nested<T> {
    Value(T),
    Seq(Seq<Nested<T>>),
}

impl<T> Nested<T> {
    pub fn capability(&self) -> Capability {
        match self {
            Nested::Value(_) => Capability::Value,
            Nested::Seq(seq) => seq.capability(),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Nested::Value(v) => Some(v),
            Nested::Seq(_) => None,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Nested<T> {
    /// A replayable synchronous nesting level.
    pub fn list(items: Vec<Nested<T>>) -> Self {
        Nested::Seq(Seq::from_values(items))
    }
}

/// An element that may still be resolving, as consumed by the `wait` family.
pub enum Pending<T> {
    Ready(T),
    Future(BoxFuture<'static, Result<T>>),
}

impl<T: Send + 'static> Pending<T> {
    /// A resolution that may fail.
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Pending::Future(Box::pin(fut))
    }

    /// A resolution that always succeeds.
    pub fn ok<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Pending::Future(Box::pin(async move { Ok(fut.await) }))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Pending::Ready(_))
    }

    pub async fn resolve(self) -> Result<T> {
        match self {
            Pending::Ready(v) => Ok(v),
            Pending::Future(fut) => fut.await,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::Ready(v) => f.debug_tuple("Ready").field(v).finish(),
            Pending::Future(_) => f.write_str("Future(..)"),
        }
    }
}
