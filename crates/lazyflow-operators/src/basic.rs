//! Stateless and lightly stateful pass-through operators.
//!
//! These carry no design risk of their own; they follow the same engine
//! contract as everything else (lazy, fused, failures pass through).

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use lazyflow_core::{AsyncIter, Capability, IterState, Item, PipeError, Result, Seq, SyncIter};

use crate::traits::{Operator, Stage};

/// Transform every value. The callback receives the operator-local index.
pub fn map<T, R, F>(f: F) -> Operator<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize, &IterState) -> R + Send + Sync + 'static,
{
    map_stage("map", move |v, i, s| Ok(f(v, i, s)))
}

/// Transform every value with a callback that may fail.
pub fn try_map<T, R, F>(f: F) -> Operator<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize, &IterState) -> Result<R> + Send + Sync + 'static,
{
    map_stage("try_map", f)
}

/// Observe every value without changing it.
pub fn tap<T, F>(f: F) -> Operator<T, T>
where
    T: Send + 'static,
    F: Fn(&T, usize, &IterState) + Send + Sync + 'static,
{
    map_stage("tap", move |v, i, s| {
        f(&v, i, s);
        Ok(v)
    })
}

fn map_stage<T, R, F>(name: &'static str, f: F) -> Operator<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize, &IterState) -> Result<R> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Operator::from_stage(name, move |state| MapStage {
        f: Arc::clone(&f),
        state: state.clone(),
        index: 0,
        out: None,
    })
}

struct MapStage<F, R> {
    f: Arc<F>,
    state: IterState,
    index: usize,
    out: Option<Result<R>>,
}

impl<T, R, F> Stage<T, R> for MapStage<F, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize, &IterState) -> Result<R> + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        self.out = Some(item.and_then(|v| {
            let index = self.index;
            self.index += 1;
            (self.f)(v, index, &self.state)
        }));
    }

    fn pop(&mut self) -> Option<Result<R>> {
        self.out.take()
    }
}

/// Emit at most `limit` values, then stop pulling upstream.
pub fn take<T: Send + 'static>(limit: usize) -> Operator<T, T> {
    Operator::from_stage("take", move |_state| TakeStage {
        limit,
        taken: 0,
        out: None,
    })
}

struct TakeStage<T> {
    limit: usize,
    taken: usize,
    out: Option<Result<T>>,
}

impl<T: Send + 'static> Stage<T, T> for TakeStage<T> {
    fn push(&mut self, item: Result<T>) {
        if item.is_ok() {
            self.taken += 1;
        }
        self.out = Some(item);
    }

    fn pop(&mut self) -> Option<Result<T>> {
        self.out.take()
    }

    fn halted(&self) -> bool {
        self.taken >= self.limit
    }
}

/// Drop the first `count` values.
pub fn skip<T: Send + 'static>(count: usize) -> Operator<T, T> {
    Operator::from_stage("skip", move |_state| SkipStage {
        count,
        seen: 0,
        out: None,
    })
}

struct SkipStage<T> {
    count: usize,
    seen: usize,
    out: Option<Result<T>>,
}

impl<T: Send + 'static> Stage<T, T> for SkipStage<T> {
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(_) if self.seen < self.count => self.seen += 1,
            other => self.out = Some(other),
        }
    }

    fn pop(&mut self) -> Option<Result<T>> {
        self.out.take()
    }
}

/// Collect the whole upstream and emit `f(values)` once.
///
/// Failed pulls pass through as they arrive; collection continues after them.
pub fn aggregate<T, R, F>(f: F) -> Operator<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(Vec<T>, &IterState) -> R + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Operator::from_stage("aggregate", move |state| AggregateStage {
        f: Arc::clone(&f),
        state: state.clone(),
        values: Vec::new(),
        out: VecDeque::new(),
        finished: false,
    })
}

/// Collect the whole upstream into one `Vec`.
pub fn to_array<T: Send + 'static>() -> Operator<T, Vec<T>> {
    aggregate(|values, _state| values)
}

/// Emit the number of values once the upstream is exhausted.
pub fn count<T: Send + 'static>() -> Operator<T, usize> {
    aggregate(|values: Vec<T>, _state| values.len())
}

struct AggregateStage<T, R, F> {
    f: Arc<F>,
    state: IterState,
    values: Vec<T>,
    out: VecDeque<Result<R>>,
    finished: bool,
}

impl<T, R, F> Stage<T, R> for AggregateStage<T, R, F>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(Vec<T>, &IterState) -> R + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(v) => self.values.push(v),
            Err(e) => self.out.push_back(Err(e)),
        }
    }

    fn end(&mut self) {
        if !self.finished {
            self.finished = true;
            let values = std::mem::take(&mut self.values);
            self.out.push_back(Ok((self.f)(values, &self.state)));
        }
    }

    fn pop(&mut self) -> Option<Result<R>> {
        self.out.pop_front()
    }
}

/// Append values and/or sequences after the upstream ends.
pub fn concat<T>(items: Vec<Item<T>>) -> Operator<T, T>
where
    T: Clone + Send + Sync + 'static,
{
    append("concat", items, false)
}

/// Emit `fallback` (a value or a sequence) when the upstream yields no value.
pub fn default_empty<T>(fallback: Item<T>) -> Operator<T, T>
where
    T: Clone + Send + Sync + 'static,
{
    append("default_empty", vec![fallback], true)
}

fn append<T>(name: &'static str, items: Vec<Item<T>>, only_if_empty: bool) -> Operator<T, T>
where
    T: Clone + Send + Sync + 'static,
{
    let items = Arc::new(items);
    let async_items = Arc::clone(&items);
    Operator::duel(
        name,
        move |upstream, state| -> SyncIter<T> {
            Box::new(Appended {
                name,
                current: upstream,
                rest: items.iter().cloned().collect(),
                state: state.clone(),
                only_if_empty,
                seen_value: false,
            })
        },
        move |upstream, state| {
            let tail = Appended {
                name,
                current: upstream,
                rest: async_items.iter().cloned().collect(),
                state: state.clone(),
                only_if_empty,
                seen_value: false,
            };
            stream::unfold(tail, |mut tail| async move {
                loop {
                    if let Some(item) = tail.current.next().await {
                        tail.seen_value |= item.is_ok();
                        return Some((item, tail));
                    }
                    if tail.only_if_empty && tail.seen_value {
                        return None;
                    }
                    match tail.rest.pop_front()? {
                        Item::Value(v) => {
                            tail.current = stream::empty().boxed();
                            tail.seen_value = true;
                            return Some((Ok(v), tail));
                        }
                        Item::Seq(seq) => tail.current = seq.attach_async(&tail.state),
                    }
                }
            })
            .boxed()
        },
    )
}

struct Appended<T, P> {
    name: &'static str,
    current: P,
    rest: VecDeque<Item<T>>,
    state: IterState,
    only_if_empty: bool,
    seen_value: bool,
}

impl<T: Send + 'static> Iterator for Appended<T, SyncIter<T>> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        loop {
            if let Some(item) = self.current.next() {
                self.seen_value |= item.is_ok();
                return Some(item);
            }
            if self.only_if_empty && self.seen_value {
                return None;
            }
            self.current = Box::new(std::iter::empty());
            match self.rest.pop_front()? {
                Item::Value(v) => {
                    self.seen_value = true;
                    return Some(Ok(v));
                }
                Item::Seq(Seq::Sync(factory)) => self.current = factory(&self.state),
                Item::Seq(Seq::Async(_)) => {
                    return Some(Err(PipeError::ModeMismatch {
                        context: self.name,
                        expected: Capability::Sync,
                        found: Capability::Async,
                    }))
                }
            }
        }
    }
}

/// Pair each value with the next value of `other`; ends with the shorter one.
pub fn zip<T, U>(other: Seq<U>) -> Operator<T, (T, U)>
where
    T: Send + 'static,
    U: Send + 'static,
{
    let async_other = other.clone();
    Operator::duel(
        "zip",
        move |upstream, state| -> SyncIter<(T, U)> {
            match &other {
                Seq::Sync(factory) => Box::new(upstream.zip(factory(state)).map(pair)),
                Seq::Async(_) => Box::new(std::iter::once(Err(PipeError::ModeMismatch {
                    context: "zip",
                    expected: Capability::Sync,
                    found: Capability::Async,
                }))),
            }
        },
        move |upstream: AsyncIter<T>, state| {
            upstream
                .zip(async_other.attach_async(state))
                .map(pair)
                .boxed()
        },
    )
}

fn pair<T, U>((a, b): (Result<T>, Result<U>)) -> Result<(T, U)> {
    Ok((a?, b?))
}
