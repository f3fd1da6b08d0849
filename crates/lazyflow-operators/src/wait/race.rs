use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use lazyflow_core::{PipeError, Result};

use super::{Fill, Slots};

/// Continuous slot refill: every settle pulls a replacement right away.
pub(super) struct RaceStream<T> {
    slots: Slots<T>,
    /// Settled (or never pending) values not yet handed downstream.
    ready: VecDeque<Result<T>>,
    /// Upstream pull failure, delivered once `ready` drains.
    failed: Option<PipeError>,
    finished: bool,
}

// No field is ever pinned in place.
impl<T> Unpin for RaceStream<T> {}

impl<T: Send + 'static> RaceStream<T> {
    pub(super) fn new(slots: Slots<T>) -> Self {
        Self {
            slots,
            ready: VecDeque::new(),
            failed: None,
            finished: false,
        }
    }
}

impl<T: Send + 'static> Stream for RaceStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        while this.failed.is_none() {
            match this.slots.fill(cx) {
                Fill::Failed(e) => {
                    this.failed = Some(e);
                    break;
                }
                Fill::Value(v) => this.ready.push_back(Ok(v)),
                Fill::Idle => {}
            }
            // the freed slot is refilled before anything is emitted
            if let Some(res) = this.slots.poll_settled(cx) {
                this.ready.push_back(res);
                if this.ready.len() < this.slots.limit {
                    continue;
                }
            }
            break;
        }
        if let Some(out) = this.ready.pop_front() {
            return Poll::Ready(Some(out));
        }
        if let Some(e) = this.failed.take() {
            this.finished = true;
            return Poll::Ready(Some(Err(e)));
        }
        if this.slots.exhausted() {
            this.finished = true;
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}
