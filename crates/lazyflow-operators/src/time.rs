//! Time-driven operators.
//!
//! Asynchronous variants use `tokio::time` and therefore need a tokio
//! runtime with the time driver enabled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use lazyflow_core::{AsyncIter, IterState, PipeError, Result, SyncIter};

use crate::traits::Operator;

/// End the sequence once `ms` milliseconds have passed since the first pull.
///
/// In an asynchronous run a pull still pending at the deadline fails with
/// `PipeError::Timeout` and the sequence ends.
pub fn timeout<T: Send + 'static>(ms: u64) -> Operator<T, T> {
    timeout_with(ms, |_index: usize, _state: &IterState| {})
}

/// `timeout` that calls `on_timeout(index, state)` once when the limit hits.
///
/// `index` is the number of values delivered before the deadline.
pub fn timeout_with<T, F>(ms: u64, on_timeout: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(usize, &IterState) + Send + Sync + 'static,
{
    let on_timeout = Arc::new(on_timeout);
    let async_cb = Arc::clone(&on_timeout);
    let limit = Duration::from_millis(ms);
    Operator::duel(
        "timeout",
        move |upstream, state| -> SyncIter<T> {
            Box::new(SyncTimeout {
                upstream,
                limit,
                started: None,
                index: 0,
                on_timeout: Arc::clone(&on_timeout),
                state: state.clone(),
                done: false,
            })
        },
        move |upstream, state| {
            let run = AsyncTimeout {
                upstream,
                ms,
                limit,
                started: None,
                index: 0,
                on_timeout: Arc::clone(&async_cb),
                state: state.clone(),
                done: false,
            };
            stream::unfold(run, |mut run| async move {
                if run.done {
                    return None;
                }
                let now = tokio::time::Instant::now();
                let deadline = *run.started.get_or_insert(now) + run.limit;
                if now > deadline {
                    run.fire();
                    return None;
                }
                let pulled = tokio::select! {
                    biased;
                    item = run.upstream.next() => Some(item),
                    _ = tokio::time::sleep_until(deadline) => None,
                };
                match pulled {
                    Some(None) => None,
                    Some(Some(item)) => {
                        if item.is_ok() {
                            run.index += 1;
                        }
                        Some((item, run))
                    }
                    None => {
                        run.fire();
                        let ms = run.ms;
                        Some((Err(PipeError::Timeout { ms }), run))
                    }
                }
            })
            .boxed()
        },
    )
}

struct SyncTimeout<T, F> {
    upstream: SyncIter<T>,
    limit: Duration,
    started: Option<std::time::Instant>,
    index: usize,
    on_timeout: Arc<F>,
    state: IterState,
    done: bool,
}

impl<T, F> Iterator for SyncTimeout<T, F>
where
    F: Fn(usize, &IterState),
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        let now = std::time::Instant::now();
        let started = *self.started.get_or_insert(now);
        if now.duration_since(started) > self.limit {
            self.done = true;
            #[cfg(feature = "tracing")]
            tracing::trace!(index = self.index, "timeout fired");
            (self.on_timeout)(self.index, &self.state);
            return None;
        }
        let item = self.upstream.next();
        match &item {
            Some(Ok(_)) => self.index += 1,
            Some(Err(_)) => {}
            None => self.done = true,
        }
        item
    }
}

struct AsyncTimeout<T, F> {
    upstream: AsyncIter<T>,
    ms: u64,
    limit: Duration,
    started: Option<tokio::time::Instant>,
    index: usize,
    on_timeout: Arc<F>,
    state: IterState,
    /// Set by whichever of the timer and the upstream finishes the run first.
    done: bool,
}

impl<T, F: Fn(usize, &IterState)> AsyncTimeout<T, F> {
    fn fire(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        #[cfg(feature = "tracing")]
        tracing::trace!(index = self.index, ms = self.ms, "timeout fired");
        (self.on_timeout)(self.index, &self.state);
    }
}

/// Hold every value back by `ms` milliseconds. Asynchronous pipelines only.
pub fn delay<T: Send + 'static>(ms: u64) -> Operator<T, T> {
    delay_with(move |_v: &T, _index: usize, _state: &IterState| ms)
}

/// Hold every value back by `cb(value, index, state)` milliseconds.
///
/// Failed pulls are not delayed. Asynchronous pipelines only.
pub fn delay_with<T, F>(cb: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) -> u64 + Send + Sync + 'static,
{
    let cb = Arc::new(cb);
    Operator::async_only("delay", move |upstream, state| {
        let cb = Arc::clone(&cb);
        let state = state.clone();
        let mut index = 0;
        upstream
            .then(move |item| {
                let ms = match &item {
                    Ok(v) => {
                        let ms = cb(v, index, &state);
                        index += 1;
                        ms
                    }
                    Err(_) => 0,
                };
                async move {
                    if ms > 0 {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                    item
                }
            })
            .boxed()
    })
}

/// Hold every value back until the future from `cb(value, index, state)`
/// completes. Asynchronous pipelines only.
pub fn throttle<T, F, Fut>(cb: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let cb = Arc::new(cb);
    Operator::async_only("throttle", move |upstream, state| {
        let cb = Arc::clone(&cb);
        let state = state.clone();
        let mut index = 0;
        upstream
            .then(move |item| {
                let gate = match &item {
                    Ok(v) => {
                        let gate = cb(v, index, &state);
                        index += 1;
                        Some(gate)
                    }
                    Err(_) => None,
                };
                async move {
                    if let Some(gate) = gate {
                        gate.await;
                    }
                    item
                }
            })
            .boxed()
    })
}
