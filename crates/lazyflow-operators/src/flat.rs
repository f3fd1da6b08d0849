//! Flattening of nested sequences.
//!
//! `flat` walks arbitrarily nested `Nested<T>` levels with an explicit stack
//! of pull objects. In a synchronous run only synchronous levels can be
//! opened; in an asynchronous run every level is opened in whichever mode it
//! carries, independently of its parent.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use lazyflow_core::{AsyncIter, Capability, IterState, Item, Nested, PipeConfig, PipeError, Result, Seq, SyncIter};

use crate::traits::Operator;

/// Expand nested sequences up to `depth` levels below the upstream.
///
/// `depth == 0` passes everything through. Values at any level pass through
/// unchanged, as do levels deeper than `depth`.
pub fn flat<T: Send + 'static>(depth: usize) -> Operator<Nested<T>, Nested<T>> {
    Operator::duel(
        "flat",
        move |upstream, state| -> SyncIter<Nested<T>> {
            Box::new(FlatIter {
                stack: vec![upstream],
                depth,
                state: state.clone(),
            })
        },
        move |upstream, state| {
            let run = FlatRun {
                stack: vec![Level::Async(upstream)],
                depth,
                state: state.clone(),
            };
            stream::unfold(run, |mut run| async move {
                loop {
                    let open = run.stack.len();
                    let next = match run.stack.last_mut()? {
                        Level::Sync(it) => it.next(),
                        Level::Async(s) => s.next().await,
                    };
                    match next {
                        None => {
                            run.stack.pop();
                        }
                        Some(Ok(Nested::Seq(seq))) if open <= run.depth => {
                            let level = match seq {
                                Seq::Sync(factory) => Level::Sync(factory(&run.state)),
                                Seq::Async(factory) => Level::Async(factory(&run.state)),
                            };
                            run.stack.push(level);
                        }
                        Some(item) => return Some((item, run)),
                    }
                }
            })
            .boxed()
        },
    )
}

/// `flat` with the depth taken from `PipeConfig::flat_depth`.
pub fn flat_default<T: Send + 'static>(config: &PipeConfig) -> Operator<Nested<T>, Nested<T>> {
    flat(config.flat_depth)
}

struct FlatIter<T> {
    stack: Vec<SyncIter<Nested<T>>>,
    depth: usize,
    state: IterState,
}

impl<T: Send + 'static> Iterator for FlatIter<T> {
    type Item = Result<Nested<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let open = self.stack.len();
            match self.stack.last_mut()?.next() {
                None => {
                    self.stack.pop();
                }
                Some(Ok(Nested::Seq(Seq::Sync(factory)))) if open <= self.depth => {
                    self.stack.push(factory(&self.state));
                }
                Some(item) => return Some(item),
            }
        }
    }
}

enum Level<T> {
    Sync(SyncIter<Nested<T>>),
    Async(AsyncIter<Nested<T>>),
}

struct FlatRun<T> {
    stack: Vec<Level<T>>,
    depth: usize,
    state: IterState,
}

/// Map every value to a value or a sequence and spread sequences in place.
///
/// All values of one mapped sequence are emitted before the next upstream
/// value is pulled. A mapped asynchronous sequence in a synchronous run
/// fails with `ModeMismatch`.
pub fn flat_map<T, R, F>(f: F) -> Operator<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize, &IterState) -> Item<R> + Send + Sync + 'static,
{
    expand("flat_map", move |v, i, s| Ok(f(v, i, s)))
}

/// Spread every upstream element, each of which must be a sequence.
///
/// A bare value fails the pull with `NotSequence` carrying its index; the
/// following elements are still spread.
pub fn spread<T: Send + 'static>() -> Operator<Item<T>, T> {
    expand("spread", |item: Item<T>, index, _state: &IterState| match item {
        Item::Seq(seq) => Ok(Item::Seq(seq)),
        Item::Value(_) => Err(PipeError::NotSequence { op: "spread", index }),
    })
}

fn expand<T, R, M>(name: &'static str, map: M) -> Operator<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    M: Fn(T, usize, &IterState) -> Result<Item<R>> + Send + Sync + 'static,
{
    let map = Arc::new(map);
    let async_map = Arc::clone(&map);
    Operator::duel(
        name,
        move |upstream, state| -> SyncIter<R> {
            Box::new(ExpandIter {
                name,
                upstream,
                inner: None,
                map: Arc::clone(&map),
                state: state.clone(),
                index: 0,
            })
        },
        move |upstream, state| {
            let run = ExpandRun {
                upstream,
                inner: None,
                map: Arc::clone(&async_map),
                state: state.clone(),
                index: 0,
            };
            stream::unfold(run, |mut run| async move {
                loop {
                    if let Some(inner) = run.inner.as_mut() {
                        if let Some(item) = inner.next().await {
                            return Some((item, run));
                        }
                        run.inner = None;
                    }
                    let v = match run.upstream.next().await? {
                        Ok(v) => v,
                        Err(e) => return Some((Err(e), run)),
                    };
                    let index = run.index;
                    run.index += 1;
                    match (run.map)(v, index, &run.state) {
                        Ok(Item::Value(r)) => return Some((Ok(r), run)),
                        Ok(Item::Seq(seq)) => run.inner = Some(seq.attach_async(&run.state)),
                        Err(e) => return Some((Err(e), run)),
                    }
                }
            })
            .boxed()
        },
    )
}

struct ExpandIter<T, R, M> {
    name: &'static str,
    upstream: SyncIter<T>,
    inner: Option<SyncIter<R>>,
    map: Arc<M>,
    state: IterState,
    index: usize,
}

impl<T, R, M> Iterator for ExpandIter<T, R, M>
where
    T: Send + 'static,
    R: Send + 'static,
    M: Fn(T, usize, &IterState) -> Result<Item<R>>,
{
    type Item = Result<R>;

    fn next(&mut self) -> Option<Result<R>> {
        loop {
            if let Some(inner) = self.inner.as_mut() {
                if let Some(item) = inner.next() {
                    return Some(item);
                }
                self.inner = None;
            }
            let v = match self.upstream.next()? {
                Ok(v) => v,
                Err(e) => return Some(Err(e)),
            };
            let index = self.index;
            self.index += 1;
            match (self.map)(v, index, &self.state) {
                Ok(Item::Value(r)) => return Some(Ok(r)),
                Ok(Item::Seq(Seq::Sync(factory))) => self.inner = Some(factory(&self.state)),
                Ok(Item::Seq(Seq::Async(_))) => {
                    return Some(Err(PipeError::ModeMismatch {
                        context: self.name,
                        expected: Capability::Sync,
                        found: Capability::Async,
                    }))
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

struct ExpandRun<T, R, M> {
    upstream: AsyncIter<T>,
    inner: Option<AsyncIter<R>>,
    map: Arc<M>,
    state: IterState,
    index: usize,
}
