#![forbid(unsafe_code)]
//! lazyflow-core: sequence abstraction, iteration state, errors, and config.
//!
//! Everything an operator needs lives here:
//! - `Seq<T>`: a lazily attached sequence, either synchronous (an `Iterator`
//!   factory) or asynchronous (a `Stream` factory).
//! - `IterState`: the per-run scratch map threaded into every callback.
//! - `PipeError`: the single error taxonomy used by every crate.
//! - `to_async` / `to_iterable`: adapters used at pipeline boundaries.
//!
//! No operator logic lives here; see `lazyflow-operators`.

pub mod config;
pub mod convert;
pub mod error;
pub mod prelude;
pub mod seq;
pub mod state;

pub use config::PipeConfig;
pub use convert::{to_async, to_iterable, Pulled};
pub use error::{PipeError, Result};
pub use seq::{AsyncIter, Capability, Item, Nested, Pending, Seq, SyncIter};
pub use state::IterState;
