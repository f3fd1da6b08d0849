//! Failure interception.

use std::sync::Arc;

use lazyflow_core::{IterState, PipeError, Result};

use crate::traits::{Operator, Stage};

/// What a `catch_error` handler knows about the failure it is handling.
#[derive(Debug, Clone)]
pub struct ErrorContext<T> {
    /// Position of the failed pull among all pulls of this run.
    pub index: usize,
    /// The last value delivered downstream, if any.
    pub last_value: Option<T>,
    /// How many failures in a row (no value in between) equal this one.
    pub repeats: usize,
    pub state: IterState,
    emitted: Option<T>,
}

impl<T> ErrorContext<T> {
    /// Deliver `value` downstream in place of the failure.
    pub fn emit(&mut self, value: T) {
        self.emitted = Some(value);
    }

    pub fn emitted(&self) -> Option<&T> {
        self.emitted.as_ref()
    }
}

/// Hand every failed pull to `handler`.
///
/// The handler may swallow the failure (`Ok(())`), replace it with a value
/// (`ctx.emit`), or fail with the same or another error (`Err`), which is
/// then delivered downstream. Values pass through untouched.
pub fn catch_error<T, F>(handler: F) -> Operator<T, T>
where
    T: Clone + Send + 'static,
    F: Fn(PipeError, &mut ErrorContext<T>) -> Result<()> + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    Operator::from_stage("catch_error", move |state| CatchStage {
        handler: Arc::clone(&handler),
        state: state.clone(),
        index: 0,
        last_value: None,
        last_error: None,
        repeats: 0,
        out: None,
    })
}

struct CatchStage<F, T> {
    handler: Arc<F>,
    state: IterState,
    index: usize,
    last_value: Option<T>,
    last_error: Option<PipeError>,
    repeats: usize,
    out: Option<Result<T>>,
}

impl<T, F> Stage<T, T> for CatchStage<F, T>
where
    T: Clone + Send + 'static,
    F: Fn(PipeError, &mut ErrorContext<T>) -> Result<()> + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        let index = self.index;
        self.index += 1;
        let err = match item {
            Ok(v) => {
                self.last_error = None;
                self.last_value = Some(v.clone());
                self.out = Some(Ok(v));
                return;
            }
            Err(e) => e,
        };

        self.repeats = match &self.last_error {
            Some(prev) if prev.same_as(&err) => self.repeats + 1,
            _ => 0,
        };
        self.last_error = Some(err.clone());

        let mut ctx = ErrorContext {
            index,
            last_value: self.last_value.clone(),
            repeats: self.repeats,
            state: self.state.clone(),
            emitted: None,
        };
        match (self.handler)(err, &mut ctx) {
            Ok(()) => {
                if let Some(v) = ctx.emitted {
                    self.last_value = Some(v.clone());
                    self.out = Some(Ok(v));
                }
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(index, error = %e, "catch_error handler re-raised");
                self.out = Some(Err(e));
            }
        }
    }

    fn pop(&mut self) -> Option<Result<T>> {
        self.out.take()
    }
}
