#![forbid(unsafe_code)]
//! lazyflow-operators: dual-mode operators over `lazyflow_core::Seq`.
//!
//! Design intent:
//! - One definition per operator; `Operator::apply` picks the synchronous or
//!   asynchronous implementation from the upstream capability.
//! - Operators are cold values. Indices, buffers and flags are created per
//!   run, inside the attached factory.
//! - Construction never fails. Bad configuration and async-only operators in
//!   synchronous pipelines fail on the first pull instead.
//! - Most operators are a `Stage` (push/pop state machine) driven in both
//!   modes; the racing, flattening and time operators own their drivers.

pub mod traits;

pub mod basic;
pub mod catch;
pub mod filter;
pub mod flat;
pub mod reduce;
pub mod retry;
pub mod time;
pub mod wait;
pub mod window;

pub use traits::{Operator, Stage};

pub use basic::{aggregate, concat, count, default_empty, map, skip, take, tap, to_array, try_map, zip};
pub use catch::{catch_error, ErrorContext};
pub use filter::{distinct, distinct_by, filter, skip_while, take_while};
pub use flat::{flat, flat_default, flat_map, spread};
pub use reduce::{reduce, reduce_async, reduce_with};
pub use retry::{repeat, repeat_while, retry, retry_while, retry_while_async};
pub use time::{delay, delay_with, throttle, timeout, timeout_with};
pub use wait::{wait, wait_cache, wait_race, wait_race_default};
pub use window::{page, split, split_with, Carry, SplitIndex, SplitOptions};
