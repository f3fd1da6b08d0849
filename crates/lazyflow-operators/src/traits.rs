//! Operator value + the stage abstraction shared by both execution modes.
//!
//! An `Operator<T, R>` carries two implementations of the same transformation,
//! one over `SyncIter<T>` and one over `AsyncIter<T>`. `apply` probes the
//! upstream capability exactly once (at attachment) and wires the matching
//! implementation into the downstream factory. Nothing runs until the
//! downstream is consumed; per-run state is allocated inside the factory.
//!
//! Most operators don't need to care about the mode at all: they implement
//! `Stage`, a push/pop state machine with no I/O, and `Operator::from_stage`
//! drives it with a blocking iterator driver and a polling stream driver.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};
use lazyflow_core::{AsyncIter, IterState, PipeError, Result, Seq, SyncIter};

pub type SyncImpl<T, R> = Arc<dyn Fn(SyncIter<T>, &IterState) -> SyncIter<R> + Send + Sync>;
pub type AsyncImpl<T, R> = Arc<dyn Fn(AsyncIter<T>, &IterState) -> AsyncIter<R> + Send + Sync>;

/// A reusable, dual-mode transformation from `Seq<T>` to `Seq<R>`.
pub struct Operator<T, R> {
    name: &'static str,
    sync_impl: SyncImpl<T, R>,
    async_impl: AsyncImpl<T, R>,
}

impl<T, R> Clone for Operator<T, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sync_impl: Arc::clone(&self.sync_impl),
            async_impl: Arc::clone(&self.async_impl),
        }
    }
}

impl<T, R> std::fmt::Debug for Operator<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator").field("name", &self.name).finish()
    }
}

impl<T: Send + 'static, R: Send + 'static> Operator<T, R> {
    /// Pair a synchronous and an asynchronous implementation.
    pub fn duel<S, A>(name: &'static str, sync_impl: S, async_impl: A) -> Self
    where
        S: Fn(SyncIter<T>, &IterState) -> SyncIter<R> + Send + Sync + 'static,
        A: Fn(AsyncIter<T>, &IterState) -> AsyncIter<R> + Send + Sync + 'static,
    {
        Self {
            name,
            sync_impl: Arc::new(sync_impl),
            async_impl: Arc::new(async_impl),
        }
    }

    /// An operator with no synchronous meaning.
    ///
    /// In a synchronous pipeline the first pull fails with
    /// `PipeError::AsyncOnly`; attaching never fails.
    pub fn async_only<A>(name: &'static str, async_impl: A) -> Self
    where
        A: Fn(AsyncIter<T>, &IterState) -> AsyncIter<R> + Send + Sync + 'static,
    {
        Self::duel(
            name,
            move |_upstream, _state| -> SyncIter<R> {
                Box::new(std::iter::once(Err(PipeError::AsyncOnly { op: name })))
            },
            async_impl,
        )
    }

    /// An operator whose configuration was rejected: the first pull fails
    /// with `err` in either mode.
    pub fn failing(name: &'static str, err: PipeError) -> Self {
        let async_err = err.clone();
        Self::duel(
            name,
            move |_upstream, _state| -> SyncIter<R> { Box::new(std::iter::once(Err(err.clone()))) },
            move |_upstream, _state| stream::iter(std::iter::once(Err(async_err.clone()))).boxed(),
        )
    }

    /// Build both implementations from one `Stage`, created fresh per run.
    pub fn from_stage<S, M>(name: &'static str, make: M) -> Self
    where
        S: Stage<T, R>,
        M: Fn(&IterState) -> S + Send + Sync + 'static,
    {
        let make = Arc::new(make);
        let make_async = Arc::clone(&make);
        Self::duel(
            name,
            move |upstream, state| -> SyncIter<R> { Box::new(StageIter::new(upstream, make(state))) },
            move |upstream, state| StageStream::new(upstream, make_async(state)).boxed(),
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Attach to `upstream`, producing the downstream sequence.
    ///
    /// The capability is probed here, once. The output is fused, so a
    /// finished pull object keeps answering `None`.
    pub fn apply(&self, upstream: Seq<T>) -> Seq<R> {
        match upstream {
            Seq::Sync(source) => {
                let op = Arc::clone(&self.sync_impl);
                Seq::sync_factory(move |state| -> SyncIter<R> {
                    Box::new(op(source(state), state).fuse())
                })
            }
            Seq::Async(source) => {
                let op = Arc::clone(&self.async_impl);
                Seq::async_factory(move |state| op(source(state), state).fuse().boxed())
            }
        }
    }

    /// Fuse two operators into one (`self` first).
    pub fn then<U: Send + 'static>(self, next: Operator<R, U>) -> Operator<T, U> {
        let (first_sync, next_sync) = (self.sync_impl, Arc::clone(&next.sync_impl));
        let (first_async, next_async) = (self.async_impl, next.async_impl);
        Operator::duel(
            next.name,
            move |upstream, state| next_sync(first_sync(upstream, state), state),
            move |upstream, state| next_async(first_async(upstream, state), state),
        )
    }
}

/// A mode-agnostic operator core.
///
/// The driver alternates between `pop` (deliver what is ready) and pulling
/// upstream into `push`; `end` is called once when the upstream is exhausted.
/// A stage never pulls by itself, so the same state machine serves the
/// blocking and the polling driver.
pub trait Stage<T, R>: Send + 'static {
    /// Hand one upstream pull (value or failure) to the stage.
    fn push(&mut self, item: Result<T>);

    /// The upstream is exhausted; queue any final output.
    fn end(&mut self) {}

    /// Take the next downstream output, if one is ready.
    fn pop(&mut self) -> Option<Result<R>>;

    /// When true the driver stops pulling upstream (e.g. `take`).
    fn halted(&self) -> bool {
        false
    }
}

struct StageIter<T, R, S> {
    upstream: SyncIter<T>,
    stage: S,
    ended: bool,
    _out: PhantomData<fn() -> R>,
}

impl<T, R, S> StageIter<T, R, S> {
    fn new(upstream: SyncIter<T>, stage: S) -> Self {
        Self {
            upstream,
            stage,
            ended: false,
            _out: PhantomData,
        }
    }
}

impl<T, R, S: Stage<T, R>> Iterator for StageIter<T, R, S> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Result<R>> {
        loop {
            if let Some(out) = self.stage.pop() {
                return Some(out);
            }
            if self.ended {
                return None;
            }
            if self.stage.halted() {
                self.ended = true;
                continue;
            }
            match self.upstream.next() {
                Some(item) => self.stage.push(item),
                None => {
                    self.ended = true;
                    self.stage.end();
                }
            }
        }
    }
}

struct StageStream<T, R, S> {
    upstream: AsyncIter<T>,
    stage: Box<S>,
    ended: bool,
    _out: PhantomData<fn() -> R>,
}

impl<T, R, S> StageStream<T, R, S> {
    fn new(upstream: AsyncIter<T>, stage: S) -> Self {
        Self {
            upstream,
            stage: Box::new(stage),
            ended: false,
            _out: PhantomData,
        }
    }
}

impl<T, R, S: Stage<T, R>> Stream for StageStream<T, R, S> {
    type Item = Result<R>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<R>>> {
        let this = self.get_mut();
        loop {
            if let Some(out) = this.stage.pop() {
                return Poll::Ready(Some(out));
            }
            if this.ended {
                return Poll::Ready(None);
            }
            if this.stage.halted() {
                this.ended = true;
                continue;
            }
            match this.upstream.poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => this.stage.push(item),
                Poll::Ready(None) => {
                    this.ended = true;
                    this.stage.end();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyflow_core::to_async;

    /// Emits every value twice.
    struct Twice<T> {
        pending: Vec<Result<T>>,
    }

    impl<T: Clone + Send + 'static> Stage<T, T> for Twice<T> {
        fn push(&mut self, item: Result<T>) {
            if let Ok(v) = &item {
                self.pending.push(Ok(v.clone()));
            }
            self.pending.push(item);
        }

        fn pop(&mut self) -> Option<Result<T>> {
            if self.pending.is_empty() {
                None
            } else {
                Some(self.pending.remove(0))
            }
        }
    }

    fn twice<T: Clone + Send + 'static>() -> Operator<T, T> {
        Operator::from_stage("twice", |_state| Twice { pending: vec![] })
    }

    #[test]
    fn stage_runs_synchronously() {
        let out = twice().apply(Seq::from_values(vec![1, 2]));
        assert!(out.is_sync());
        assert_eq!(out.collect_sync().unwrap(), vec![1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn stage_runs_asynchronously() {
        let out = twice().apply(to_async(Seq::from_values(vec![1, 2])));
        assert!(out.is_async());
        assert_eq!(out.collect_async().await.unwrap(), vec![1, 1, 2, 2]);
    }

    #[test]
    fn async_only_fails_on_pull_not_on_attach() {
        let op: Operator<i32, i32> = Operator::async_only("later", |up, _| up);
        let seq = op.apply(Seq::from_values(vec![1]));
        let mut it = seq.iter();
        assert!(matches!(it.next(), Some(Err(PipeError::AsyncOnly { op: "later" }))));
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    #[test]
    fn operators_compose() {
        let op = twice::<u8>().then(twice());
        assert_eq!(op.name(), "twice");
        let out = op.apply(Seq::from_values(vec![7]));
        assert_eq!(out.collect_sync().unwrap(), vec![7, 7, 7, 7]);
    }
}
