//! Resolving sequences of pending values.
//!
//! `wait` resolves strictly in source order. `wait_race` and `wait_cache`
//! keep up to `N` resolutions in flight inside one stream (no spawned tasks)
//! and emit in settle order; they differ in when a settled slot is refilled.
//! All of them are async-only.

mod cache;
mod race;

use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use lazyflow_core::{AsyncIter, PipeConfig, PipeError, Pending, Result};

use crate::traits::Operator;

/// Resolve every element in order, one at a time.
pub fn wait<T: Send + 'static>() -> Operator<Pending<T>, T> {
    Operator::async_only("wait", |upstream: AsyncIter<Pending<T>>, _state| {
        upstream
            .then(|item| async move {
                match item {
                    Ok(pending) => pending.resolve().await,
                    Err(e) => Err(e),
                }
            })
            .boxed()
    })
}

/// Emit in settle order with at most `concurrency` resolutions in flight.
///
/// A settled slot is refilled from upstream in the same poll. Ready values
/// are emitted without taking a slot. A failed resolution is delivered as
/// an `Err` item and the race goes on. A failed upstream pull ends the
/// sequence: values that already settled are delivered first, then the
/// failure; whatever was still in flight is dropped.
///
/// `concurrency < 2` is plain `wait()`.
pub fn wait_race<T: Send + 'static>(concurrency: usize) -> Operator<Pending<T>, T> {
    if concurrency < 2 {
        return wait();
    }
    Operator::async_only("wait_race", move |upstream, _state| {
        race::RaceStream::new(Slots::new(upstream, concurrency)).boxed()
    })
}

/// `wait_race` bounded by `PipeConfig::default_concurrency`.
pub fn wait_race_default<T: Send + 'static>(config: &PipeConfig) -> Operator<Pending<T>, T> {
    wait_race(config.default_concurrency)
}

/// Fill up to `concurrency` resolutions on each downstream pull, then emit
/// the first to settle.
///
/// Unlike `wait_race`, nothing is pulled from upstream between downstream
/// pulls. `concurrency < 2` is plain `wait()`.
pub fn wait_cache<T: Send + 'static>(concurrency: usize) -> Operator<Pending<T>, T> {
    if concurrency < 2 {
        return wait();
    }
    Operator::async_only("wait_cache", move |upstream, _state| {
        cache::CacheStream::new(Slots::new(upstream, concurrency)).boxed()
    })
}

type Keyed<T> = BoxFuture<'static, (u64, Result<T>)>;

/// The keyed in-flight set shared by the racing streams.
struct Slots<T> {
    upstream: AsyncIter<Pending<T>>,
    limit: usize,
    in_flight: FuturesUnordered<Keyed<T>>,
    next_key: u64,
    upstream_done: bool,
}

enum Fill<T> {
    /// Slots are full, upstream is pending, or upstream is done.
    Idle,
    /// Upstream produced a value that needs no resolution.
    Value(T),
    /// Upstream pull failed.
    Failed(PipeError),
}

impl<T: Send + 'static> Slots<T> {
    fn new(upstream: AsyncIter<Pending<T>>, limit: usize) -> Self {
        Self {
            upstream,
            limit,
            in_flight: FuturesUnordered::new(),
            next_key: 0,
            upstream_done: false,
        }
    }

    /// Pull from upstream until every slot is taken.
    fn fill(&mut self, cx: &mut Context<'_>) -> Fill<T> {
        while !self.upstream_done && self.in_flight.len() < self.limit {
            match self.upstream.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(Pending::Ready(v)))) => return Fill::Value(v),
                Poll::Ready(Some(Ok(Pending::Future(fut)))) => {
                    let key = self.next_key;
                    self.next_key += 1;
                    #[cfg(feature = "tracing")]
                    tracing::trace!(key, in_flight = self.in_flight.len() + 1, "slot filled");
                    self.in_flight.push(fut.map(move |res| (key, res)).boxed());
                }
                Poll::Ready(Some(Err(e))) => {
                    self.upstream_done = true;
                    self.in_flight = FuturesUnordered::new();
                    return Fill::Failed(e);
                }
                Poll::Ready(None) => self.upstream_done = true,
                Poll::Pending => break,
            }
        }
        Fill::Idle
    }

    /// Poll the in-flight set for the next settled resolution.
    fn poll_settled(&mut self, cx: &mut Context<'_>) -> Option<Result<T>> {
        if self.in_flight.is_empty() {
            return None;
        }
        match self.in_flight.poll_next_unpin(cx) {
            Poll::Ready(Some((_key, res))) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(key = _key, ok = res.is_ok(), "slot settled");
                Some(res)
            }
            Poll::Ready(None) | Poll::Pending => None,
        }
    }

    fn exhausted(&self) -> bool {
        self.upstream_done && self.in_flight.is_empty()
    }
}
