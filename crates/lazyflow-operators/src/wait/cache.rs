use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use lazyflow_core::Result;

use super::{Fill, Slots};

/// Lazy refill: slots are topped up only when downstream pulls.
pub(super) struct CacheStream<T> {
    slots: Slots<T>,
    finished: bool,
}

impl<T> Unpin for CacheStream<T> {}

impl<T: Send + 'static> CacheStream<T> {
    pub(super) fn new(slots: Slots<T>) -> Self {
        Self { slots, finished: false }
    }
}

impl<T: Send + 'static> Stream for CacheStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.slots.fill(cx) {
            Fill::Failed(e) => {
                this.finished = true;
                return Poll::Ready(Some(Err(e)));
            }
            Fill::Value(v) => return Poll::Ready(Some(Ok(v))),
            Fill::Idle => {}
        }
        if let Some(res) = this.slots.poll_settled(cx) {
            return Poll::Ready(Some(res));
        }
        if this.slots.exhausted() {
            this.finished = true;
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}
