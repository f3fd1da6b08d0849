//! Windowing: grouping consecutive values into `Vec`s.
//!
//! `split` closes windows on a predicate, `page` on a fixed size.

mod page;

pub use page::page;

use std::collections::VecDeque;
use std::sync::Arc;

use lazyflow_core::{IterState, Result};
use serde::{Deserialize, Serialize};

use crate::traits::{Operator, Stage};

/// Where a trigger value ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carry {
    /// Drop the trigger.
    #[default]
    None,
    /// Last item of the window being closed.
    Back,
    /// First item of the next window.
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    /// The predicate flips collection on and off instead of marking separators.
    pub toggle: bool,
    /// Placement of a trigger that opens a window (toggle mode).
    pub carry_start: Carry,
    /// Placement of a trigger that closes a window.
    pub carry_end: Carry,
    /// Drop empty windows at the edges of the run.
    pub trim: bool,
}

/// Position of a value handed to the `split` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitIndex {
    /// Absolute position in the run.
    pub start: usize,
    /// Position since the last window boundary. A window opens at the count
    /// of values it already holds, so a carried trigger (forward from the
    /// closed window, or a toggle's start trigger under any carry) counts.
    pub list: usize,
    /// Number of boundaries (closed windows and toggles) so far.
    pub split: usize,
}

/// Split into windows at every value where `pred` holds.
pub fn split<T, F>(pred: F) -> Operator<T, Vec<T>>
where
    T: Send + 'static,
    F: Fn(&T, SplitIndex, &IterState) -> bool + Send + Sync + 'static,
{
    split_with(pred, SplitOptions::default())
}

/// `split` with explicit toggle, carry and trim options.
///
/// Non-toggle: a matching value closes the current window (placed according
/// to `carry_end`). Toggle: a matching value closes the window while
/// collecting (`carry_end`) and opens one while skipping (`carry_start`,
/// where any carry other than `None` makes it the first item).
///
/// Windows are emitted even when empty. With `trim`, empty windows before
/// the first non-empty one and an empty final window are dropped; emptiness
/// is judged after carried triggers are placed.
pub fn split_with<T, F>(pred: F, options: SplitOptions) -> Operator<T, Vec<T>>
where
    T: Send + 'static,
    F: Fn(&T, SplitIndex, &IterState) -> bool + Send + Sync + 'static,
{
    let pred = Arc::new(pred);
    Operator::from_stage("split", move |state| SplitStage {
        pred: Arc::clone(&pred),
        state: state.clone(),
        options,
        collecting: !options.toggle,
        window: Vec::new(),
        carried: None,
        index: SplitIndex::default(),
        emitted_any: false,
        out: VecDeque::new(),
        finished: false,
    })
}

struct SplitStage<F, T> {
    pred: Arc<F>,
    state: IterState,
    options: SplitOptions,
    collecting: bool,
    window: Vec<T>,
    /// Forward-carried trigger waiting for the next window to open.
    carried: Option<T>,
    index: SplitIndex,
    /// A non-empty window was emitted (trim stops applying to leading windows).
    emitted_any: bool,
    out: VecDeque<Result<Vec<T>>>,
    finished: bool,
}

impl<F, T> SplitStage<F, T> {
    fn close(&mut self, trigger: T) {
        match self.options.carry_end {
            Carry::Back => self.window.push(trigger),
            Carry::Forward => self.carried = Some(trigger),
            Carry::None => {}
        }
        let window = std::mem::take(&mut self.window);
        self.emit(window, false);
        self.index.split += 1;
        self.index.list = 0;
        if self.options.toggle {
            self.collecting = false;
        } else {
            self.open();
        }
    }

    fn open(&mut self) {
        if let Some(carried) = self.carried.take() {
            self.window.push(carried);
        }
        self.collecting = true;
        self.index.list = self.window.len();
    }

    fn emit(&mut self, window: Vec<T>, at_end: bool) {
        if window.is_empty() && self.options.trim && (at_end || !self.emitted_any) {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(len = window.len(), split = self.index.split, "split: window emitted");
        self.emitted_any |= !window.is_empty();
        self.out.push_back(Ok(window));
    }
}

impl<T, F> Stage<T, Vec<T>> for SplitStage<F, T>
where
    T: Send + 'static,
    F: Fn(&T, SplitIndex, &IterState) -> bool + Send + Sync + 'static,
{
    fn push(&mut self, item: Result<T>) {
        let value = match item {
            Ok(v) => v,
            Err(e) => {
                self.out.push_back(Err(e));
                return;
            }
        };
        let index = self.index;
        self.index.start += 1;
        self.index.list += 1;
        let hit = (self.pred)(&value, index, &self.state);

        if self.collecting {
            if hit {
                self.close(value);
            } else {
                self.window.push(value);
            }
        } else if hit {
            // start trigger
            self.index.split += 1;
            self.open();
            if self.options.carry_start != Carry::None {
                self.window.push(value);
                self.index.list += 1;
            }
        }
    }

    fn end(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if !self.collecting {
            // a forward carry only lives on if its window opens
            self.carried = None;
            return;
        }
        let window = std::mem::take(&mut self.window);
        self.emit(window, true);
    }

    fn pop(&mut self) -> Option<Result<Vec<T>>> {
        self.out.pop_front()
    }
}
