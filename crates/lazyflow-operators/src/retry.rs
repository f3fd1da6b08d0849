//! Re-pulling after failures and re-emitting values.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use lazyflow_core::{AsyncIter, IterState, PipeError, Result};

use crate::traits::{Operator, Stage};

/// Re-pull up to `attempts` times after a failed pull.
///
/// Once the attempts for one position are used up the failure is delivered.
/// The counter resets after every successful value.
pub fn retry<T: Send + 'static>(attempts: usize) -> Operator<T, T> {
    retry_stage("retry", move |attempt: usize, _err: &PipeError, _index: usize, _state: &IterState| {
        attempt <= attempts
    })
}

/// Re-pull while `cb(attempt, error, index, state)` returns true.
///
/// `attempt` counts from 1 for the first retry of the current position and
/// `index` is the number of values delivered so far.
pub fn retry_while<T, F>(cb: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(usize, &PipeError, usize, &IterState) -> bool + Send + Sync + 'static,
{
    retry_stage("retry", cb)
}

fn retry_stage<T, F>(name: &'static str, cb: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(usize, &PipeError, usize, &IterState) -> bool + Send + Sync + 'static,
{
    let cb = Arc::new(cb);
    Operator::from_stage(name, move |state| RetryStage {
        cb: Arc::clone(&cb),
        state: state.clone(),
        attempts: 0,
        index: 0,
        out: None,
    })
}

struct RetryStage<F, T> {
    cb: Arc<F>,
    state: IterState,
    attempts: usize,
    index: usize,
    out: Option<Result<T>>,
}

impl<T, F> Stage<T, T> for RetryStage<F, T>
where
    T: Send + 'static,
    F: Fn(usize, &PipeError, usize, &IterState) -> bool + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(v) => {
                self.attempts = 0;
                self.index += 1;
                self.out = Some(Ok(v));
            }
            Err(e) => {
                let attempt = self.attempts + 1;
                if (self.cb)(attempt, &e, self.index, &self.state) {
                    // swallowed; the driver pulls again
                    self.attempts = attempt;
                    #[cfg(feature = "tracing")]
                    tracing::trace!(attempt, index = self.index, error = %e, "retrying pull");
                } else {
                    self.attempts = 0;
                    self.out = Some(Err(e));
                }
            }
        }
    }

    fn pop(&mut self) -> Option<Result<T>> {
        self.out.take()
    }
}

/// `retry_while` with an asynchronous decision. Asynchronous pipelines only.
pub fn retry_while_async<T, F, Fut>(cb: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(usize, PipeError, usize, &IterState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let cb = Arc::new(cb);
    Operator::async_only("retry_while_async", move |upstream, state| {
        let run = AsyncRetry {
            upstream,
            cb: Arc::clone(&cb),
            state: state.clone(),
            attempts: 0,
            index: 0,
        };
        stream::unfold(run, |mut run| async move {
            loop {
                match run.upstream.next().await? {
                    Ok(v) => {
                        run.attempts = 0;
                        run.index += 1;
                        return Some((Ok(v), run));
                    }
                    Err(e) => {
                        let attempt = run.attempts + 1;
                        if (run.cb)(attempt, e.clone(), run.index, &run.state).await {
                            run.attempts = attempt;
                            continue;
                        }
                        run.attempts = 0;
                        return Some((Err(e), run));
                    }
                }
            }
        })
        .boxed()
    })
}

struct AsyncRetry<T, F> {
    upstream: AsyncIter<T>,
    cb: Arc<F>,
    state: IterState,
    attempts: usize,
    index: usize,
}

/// Emit every value `1 + times` times in a row.
pub fn repeat<T>(times: usize) -> Operator<T, T>
where
    T: Clone + Send + 'static,
{
    repeat_while(move |_v: &T, _index: usize, repeats: usize, _state: &IterState| repeats < times)
}

/// Re-emit a value while `cb(value, index, repeats, state)` holds.
///
/// `repeats` is how many extra copies were already emitted. The callback is
/// consulted lazily, one copy per downstream pull.
pub fn repeat_while<T, F>(cb: F) -> Operator<T, T>
where
    T: Clone + Send + 'static,
    F: Fn(&T, usize, usize, &IterState) -> bool + Send + Sync + 'static,
{
    let cb = Arc::new(cb);
    Operator::from_stage("repeat", move |state| RepeatStage {
        cb: Arc::clone(&cb),
        state: state.clone(),
        current: None,
        fresh: false,
        repeats: 0,
        index: 0,
        err: None,
    })
}

struct RepeatStage<F, T> {
    cb: Arc<F>,
    state: IterState,
    current: Option<T>,
    fresh: bool,
    repeats: usize,
    index: usize,
    err: Option<PipeError>,
}

impl<T, F> Stage<T, T> for RepeatStage<F, T>
where
    T: Clone + Send + 'static,
    F: Fn(&T, usize, usize, &IterState) -> bool + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(v) => {
                self.current = Some(v);
                self.fresh = true;
                self.repeats = 0;
            }
            Err(e) => self.err = Some(e),
        }
    }

    fn pop(&mut self) -> Option<Result<T>> {
        if let Some(e) = self.err.take() {
            return Some(Err(e));
        }
        let value = self.current.as_ref()?;
        if self.fresh {
            self.fresh = false;
            return Some(Ok(value.clone()));
        }
        if (self.cb)(value, self.index, self.repeats, &self.state) {
            self.repeats += 1;
            return Some(Ok(value.clone()));
        }
        self.current = None;
        self.index += 1;
        None
    }
}
