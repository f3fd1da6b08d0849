//! Predicate operators with per-run state.
//!
//! Every attachment run gets its own index (and, for `distinct`, its own
//! seen-key set); nothing is stored on the operator value itself.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use lazyflow_core::{IterState, Result};

use crate::traits::{Operator, Stage};

/// Keep the values for which `pred(value, index, state)` holds.
pub fn filter<T, F>(pred: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) -> bool + Send + Sync + 'static,
{
    predicate_op("filter", pred, Mode::Keep)
}

/// Drop values while `pred` holds; pass everything after the first miss.
pub fn skip_while<T, F>(pred: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) -> bool + Send + Sync + 'static,
{
    predicate_op("skip_while", pred, Mode::SkipWhile)
}

/// Pass values while `pred` holds; stop pulling at the first miss.
pub fn take_while<T, F>(pred: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) -> bool + Send + Sync + 'static,
{
    predicate_op("take_while", pred, Mode::TakeWhile)
}

#[derive(Clone, Copy)]
enum Mode {
    Keep,
    SkipWhile,
    TakeWhile,
}

fn predicate_op<T, F>(name: &'static str, pred: F, mode: Mode) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) -> bool + Send + Sync + 'static,
{
    let pred = Arc::new(pred);
    Operator::from_stage(name, move |state| PredicateStage {
        pred: Arc::clone(&pred),
        state: state.clone(),
        mode,
        index: 0,
        // skip_while stops consulting the predicate once it has failed
        settled: false,
        stopped: false,
        out: None,
    })
}

struct PredicateStage<F, T> {
    pred: Arc<F>,
    state: IterState,
    mode: Mode,
    index: usize,
    settled: bool,
    stopped: bool,
    out: Option<Result<T>>,
}

impl<T, F> Stage<T, T> for PredicateStage<F, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) -> bool + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        let value = match item {
            Ok(v) => v,
            Err(e) => {
                self.out = Some(Err(e));
                return;
            }
        };
        let index = self.index;
        self.index += 1;
        match self.mode {
            Mode::Keep => {
                if (self.pred)(&value, index, &self.state) {
                    self.out = Some(Ok(value));
                }
            }
            Mode::SkipWhile => {
                if self.settled || !(self.pred)(&value, index, &self.state) {
                    self.settled = true;
                    self.out = Some(Ok(value));
                }
            }
            Mode::TakeWhile => {
                if (self.pred)(&value, index, &self.state) {
                    self.out = Some(Ok(value));
                } else {
                    self.stopped = true;
                }
            }
        }
    }

    fn pop(&mut self) -> Option<Result<T>> {
        self.out.take()
    }

    fn halted(&self) -> bool {
        self.stopped
    }
}

/// Drop values already seen in this run.
pub fn distinct<T>() -> Operator<T, T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    distinct_op(|v: &T, _index: usize, _state: &IterState| v.clone())
}

/// Drop values whose `key(value, index, state)` was already seen in this run.
pub fn distinct_by<T, K, F>(key: F) -> Operator<T, T>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    F: Fn(&T, usize, &IterState) -> K + Send + Sync + 'static,
{
    distinct_op(key)
}

fn distinct_op<T, K, F>(key: F) -> Operator<T, T>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    F: Fn(&T, usize, &IterState) -> K + Send + Sync + 'static,
{
    let key = Arc::new(key);
    Operator::from_stage("distinct", move |state| DistinctStage {
        key: Arc::clone(&key),
        state: state.clone(),
        seen: HashSet::new(),
        index: 0,
        out: None,
    })
}

struct DistinctStage<F, K, T> {
    key: Arc<F>,
    state: IterState,
    seen: HashSet<K>,
    index: usize,
    out: Option<Result<T>>,
}

impl<T, K, F> Stage<T, T> for DistinctStage<F, K, T>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    F: Fn(&T, usize, &IterState) -> K + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(v) => {
                let k = (self.key)(&v, self.index, &self.state);
                self.index += 1;
                if self.seen.insert(k) {
                    self.out = Some(Ok(v));
                }
            }
            Err(e) => self.out = Some(Err(e)),
        }
    }

    fn end(&mut self) {
        // release memory as soon as the run is over
        self.seen = HashSet::new();
    }

    fn pop(&mut self) -> Option<Result<T>> {
        self.out.take()
    }
}
