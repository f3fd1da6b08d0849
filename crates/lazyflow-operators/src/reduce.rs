//! Folding operators.
//!
//! Each emits exactly once, after the upstream is exhausted. Failed pulls
//! pass through as they arrive and do not disturb the accumulator.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use lazyflow_core::{AsyncIter, IterState, PipeError, Result};

use crate::traits::{Operator, Stage};

/// Fold with the first value as the seed.
///
/// An empty upstream yields `PipeError::EmptyReduce`. The callback receives
/// `(accumulator, value, index, state)`; its first call sees index 1.
pub fn reduce<T, F>(f: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(T, T, usize, &IterState) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Operator::from_stage("reduce", move |state| SeedlessReduce {
        f: Arc::clone(&f),
        state: state.clone(),
        acc: None,
        index: 0,
        out: VecDeque::new(),
        finished: false,
    })
}

struct SeedlessReduce<F, T> {
    f: Arc<F>,
    state: IterState,
    acc: Option<T>,
    index: usize,
    out: VecDeque<Result<T>>,
    finished: bool,
}

impl<T, F> Stage<T, T> for SeedlessReduce<F, T>
where
    T: Send + 'static,
    F: Fn(T, T, usize, &IterState) -> T + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(v) => {
                let index = self.index;
                self.index += 1;
                self.acc = Some(match self.acc.take() {
                    None => v,
                    Some(acc) => (self.f)(acc, v, index, &self.state),
                });
            }
            Err(e) => self.out.push_back(Err(e)),
        }
    }

    fn end(&mut self) {
        if !self.finished {
            self.finished = true;
            self.out.push_back(self.acc.take().ok_or(PipeError::EmptyReduce));
        }
    }

    fn pop(&mut self) -> Option<Result<T>> {
        self.out.pop_front()
    }
}

/// Fold from an explicit seed; an empty upstream yields the seed.
pub fn reduce_with<T, R, F>(seed: R, f: F) -> Operator<T, R>
where
    T: Send + 'static,
    R: Clone + Send + Sync + 'static,
    F: Fn(R, T, usize, &IterState) -> R + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Operator::from_stage("reduce", move |state| SeededReduce {
        f: Arc::clone(&f),
        state: state.clone(),
        acc: Some(seed.clone()),
        index: 0,
        out: VecDeque::new(),
    })
}

struct SeededReduce<F, R> {
    f: Arc<F>,
    state: IterState,
    acc: Option<R>,
    index: usize,
    out: VecDeque<Result<R>>,
}

impl<T, R, F> Stage<T, R> for SeededReduce<F, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(R, T, usize, &IterState) -> R + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(v) => {
                let index = self.index;
                self.index += 1;
                if let Some(acc) = self.acc.take() {
                    self.acc = Some((self.f)(acc, v, index, &self.state));
                }
            }
            Err(e) => self.out.push_back(Err(e)),
        }
    }

    fn end(&mut self) {
        if let Some(acc) = self.acc.take() {
            self.out.push_back(Ok(acc));
        }
    }

    fn pop(&mut self) -> Option<Result<R>> {
        self.out.pop_front()
    }
}

/// `reduce` with an asynchronous accumulator. Asynchronous pipelines only.
///
/// A failed accumulator step is delivered and ends the sequence, since the
/// accumulated value is gone.
pub fn reduce_async<T, F, Fut>(f: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(T, T, usize, &IterState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let f = Arc::new(f);
    Operator::async_only("reduce_async", move |upstream, state| {
        let run = AsyncReduce {
            upstream,
            f: Arc::clone(&f),
            state: state.clone(),
            acc: None,
            index: 0,
            finished: false,
        };
        stream::unfold(run, |mut run| async move {
            if run.finished {
                return None;
            }
            while let Some(item) = run.upstream.next().await {
                let v = match item {
                    Ok(v) => v,
                    Err(e) => return Some((Err(e), run)),
                };
                let index = run.index;
                run.index += 1;
                run.acc = match run.acc.take() {
                    None => Some(v),
                    Some(acc) => match (run.f)(acc, v, index, &run.state).await {
                        Ok(next) => Some(next),
                        Err(e) => {
                            run.finished = true;
                            return Some((Err(e), run));
                        }
                    },
                };
            }
            run.finished = true;
            let out = run.acc.take().ok_or(PipeError::EmptyReduce);
            Some((out, run))
        })
        .boxed()
    })
}

struct AsyncReduce<T, F> {
    upstream: AsyncIter<T>,
    f: Arc<F>,
    state: IterState,
    acc: Option<T>,
    index: usize,
    finished: bool,
}
