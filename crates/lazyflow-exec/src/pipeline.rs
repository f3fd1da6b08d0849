//! Pipe composer: threads a source through operators, left to right.
//!
//! - `pipe` keeps the source's mode.
//! - `pipe_sync` insists on a synchronous source; an asynchronous one gives
//!   a pipeline whose first pull fails with `ModeMismatch`.
//! - `pipe_async` adapts a synchronous source with `to_async`.
//!
//! Element types are checked at compile time through `Operator<T, R>`;
//! nothing is pulled until the pipeline is consumed.

use futures::stream::StreamExt;

use lazyflow_core::{
    to_async, AsyncIter, Capability, IterState, PipeConfig, PipeError, Result, Seq, SyncIter,
};
use lazyflow_operators::{catch_error, tap, timeout, ErrorContext, Operator};

use crate::metrics;

/// A composed sequence plus consumer conveniences.
pub struct Pipeline<T> {
    seq: Seq<T>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self { seq: self.seq.clone() }
    }
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("mode", &self.seq.capability()).finish()
    }
}

/// Start a pipeline in the source's own mode.
pub fn pipe<T: Send + 'static>(source: Seq<T>) -> Pipeline<T> {
    Pipeline { seq: source }
}

/// Start a pipeline that only accepts a synchronous source.
pub fn pipe_sync<T: Send + 'static>(source: Seq<T>) -> Pipeline<T> {
    match source {
        Seq::Sync(_) => Pipeline { seq: source },
        Seq::Async(_) => Pipeline {
            seq: Seq::failing(
                Capability::Sync,
                PipeError::ModeMismatch {
                    context: "pipe_sync",
                    expected: Capability::Sync,
                    found: Capability::Async,
                },
            ),
        },
    }
}

/// Start an asynchronous pipeline from a source of either mode.
pub fn pipe_async<T: Send + 'static>(source: Seq<T>) -> Pipeline<T> {
    Pipeline { seq: to_async(source) }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Thread one more operator.
    pub fn then<R: Send + 'static>(self, op: Operator<T, R>) -> Pipeline<R> {
        Pipeline { seq: op.apply(self.seq) }
    }

    /// Append a `catch_error` with `handler`.
    pub fn catch<F>(self, handler: F) -> Pipeline<T>
    where
        T: Clone,
        F: Fn(PipeError, &mut ErrorContext<T>) -> Result<()> + Send + Sync + 'static,
    {
        self.then(catch_error(handler))
    }

    /// Apply ambient configuration: pull tracing and a pipeline-wide timeout.
    pub fn with_config(self, config: &PipeConfig) -> Pipeline<T> {
        let mut out = self;
        if config.trace_pulls {
            out = out.then(tap(|_value: &T, index: usize, _state: &IterState| {
                metrics::emit_span("pull", &[("index", index.to_string())]);
            }));
        }
        if let Some(ms) = config.timeout_ms {
            out = out.then(timeout(ms));
        }
        out
    }

    /// First value of a fresh synchronous run.
    ///
    /// Other consumers of the same pipeline are not affected. An empty
    /// pipeline gives `Ok(None)`.
    pub fn first(&self) -> Result<Option<T>> {
        match &self.seq {
            Seq::Sync(_) => self.seq.iter().next().transpose(),
            Seq::Async(_) => Err(PipeError::ModeMismatch {
                context: "first",
                expected: Capability::Sync,
                found: Capability::Async,
            }),
        }
    }

    /// First value of a fresh run, in either mode.
    pub async fn first_async(&self) -> Result<Option<T>> {
        self.seq.stream().next().await.transpose()
    }

    pub fn iter(&self) -> SyncIter<T> {
        self.seq.iter()
    }

    pub fn stream(&self) -> AsyncIter<T> {
        self.seq.stream()
    }

    /// Drain a synchronous run, stopping at the first failed pull.
    pub fn collect(&self) -> Result<Vec<T>> {
        self.seq.collect_sync()
    }

    pub async fn collect_async(&self) -> Result<Vec<T>> {
        self.seq.collect_async().await
    }

    pub fn capability(&self) -> Capability {
        self.seq.capability()
    }

    pub fn seq(&self) -> &Seq<T> {
        &self.seq
    }

    pub fn into_seq(self) -> Seq<T> {
        self.seq
    }
}

impl<T> From<Pipeline<T>> for Seq<T> {
    fn from(p: Pipeline<T>) -> Self {
        p.seq
    }
}

/// `pipe!(source, op1, ..., opN)` is `pipe(source).then(op1)...then(opN)`.
#[macro_export]
macro_rules! pipe {
    ($source:expr $(, $op:expr)* $(,)?) => {
        $crate::pipe($source)$(.then($op))*
    };
}
