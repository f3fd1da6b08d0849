//! Adapters used at pipeline boundaries.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};

use crate::error::{PipeError, Result};
use crate::seq::{Capability, Seq, SyncIter};

/// Adapt any sequence to the asynchronous mode.
///
/// Asynchronous sequences are returned unchanged; synchronous pulls become
/// immediately ready stream items.
pub fn to_async<T: Send + 'static>(seq: Seq<T>) -> Seq<T> {
    match seq {
        Seq::Async(_) => seq,
        Seq::Sync(factory) => Seq::async_factory(move |state| stream::iter(factory(state)).boxed()),
    }
}

/// The outcome of one call to a raw puller.
pub enum Pulled<T> {
    /// The pull completed synchronously (`None` = exhausted).
    Ready(Option<Result<T>>),
    /// The pull completes later.
    Pending(BoxFuture<'static, Option<Result<T>>>),
}

/// Adapt a bare puller (no capability marker) into a sequence.
///
/// The mode is detected by calling `puller` once: a `Ready` result gives a
/// synchronous sequence, a `Pending` one an asynchronous sequence. That
/// first call happens here, so a failed first pull is returned as `Err`
/// from `to_iterable` itself instead of surfacing during iteration.
///
/// The result is single-pass: the puller is consumed by the first run.
pub fn to_iterable<T, P>(mut puller: P) -> Result<Seq<T>>
where
    T: Send + 'static,
    P: FnMut() -> Pulled<T> + Send + 'static,
{
    match puller() {
        Pulled::Ready(Some(Err(err))) => Err(err),
        Pulled::Ready(first) => {
            #[cfg(feature = "tracing")]
            tracing::trace!("to_iterable: detected synchronous puller");
            let slot = Arc::new(Mutex::new(Some((first, puller))));
            Ok(Seq::sync_factory(move |_| -> SyncIter<T> {
                match take_slot(&slot) {
                    Some((first, puller)) => Box::new(RawSyncIter {
                        first: Some(first),
                        puller,
                        done: false,
                    }),
                    None => Box::new(std::iter::empty()),
                }
            }))
        }
        Pulled::Pending(first) => {
            #[cfg(feature = "tracing")]
            tracing::trace!("to_iterable: detected asynchronous puller");
            let slot = Arc::new(Mutex::new(Some((first, puller))));
            Ok(Seq::async_factory(move |_| match take_slot(&slot) {
                Some((first, puller)) => {
                    let raw = RawAsync {
                        first: Some(first),
                        puller,
                    };
                    stream::unfold(raw, |mut raw| async move {
                        let next = match raw.first.take() {
                            Some(fut) => fut.await,
                            None => match (raw.puller)() {
                                Pulled::Ready(next) => next,
                                Pulled::Pending(fut) => fut.await,
                            },
                        };
                        next.map(|item| (item, raw))
                    })
                    .fuse()
                    .boxed()
                }
                None => stream::empty().boxed(),
            }))
        }
    }
}

struct RawSyncIter<T, P> {
    first: Option<Option<Result<T>>>,
    puller: P,
    done: bool,
}

impl<T, P> Iterator for RawSyncIter<T, P>
where
    P: FnMut() -> Pulled<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        let next = match self.first.take() {
            Some(first) => first,
            None => match (self.puller)() {
                Pulled::Ready(next) => next,
                Pulled::Pending(_) => {
                    self.done = true;
                    return Some(Err(PipeError::ModeMismatch {
                        context: "to_iterable",
                        expected: Capability::Sync,
                        found: Capability::Async,
                    }));
                }
            },
        };
        if next.is_none() {
            self.done = true;
        }
        next
    }
}

struct RawAsync<T, P> {
    first: Option<BoxFuture<'static, Option<Result<T>>>>,
    puller: P,
}

fn take_slot<S>(slot: &Mutex<Option<S>>) -> Option<S> {
    slot.lock().unwrap_or_else(|p| p.into_inner()).take()
}
