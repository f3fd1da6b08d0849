#![forbid(unsafe_code)]
//! lazyflow: lazy, pull-based sequence pipelines.
//!
//! One operator definition runs in both execution modes: over a blocking
//! `Iterator` when the source is synchronous and over a `Stream` when it is
//! asynchronous. This crate re-exports the workspace:
//! - [`lazyflow_core`]: `Seq`, `IterState`, `PipeError`, `PipeConfig`
//! - [`ops`]: every operator factory
//! - [`lazyflow_exec`]: `pipe`, `pipe_sync`, `pipe_async`, `pipe!`
//!
//! ```
//! use lazyflow::prelude::*;
//!
//! let evens = pipe!(
//!     Seq::from_values((1..=9).collect::<Vec<i32>>()),
//!     ops::filter(|v: &i32, _, _| v % 2 == 0),
//!     ops::to_array(),
//! );
//! assert_eq!(evens.first().unwrap(), Some(vec![2, 4, 6, 8]));
//! ```

pub use lazyflow_core::*;
pub use lazyflow_exec::{metrics, pipe, pipe_async, pipe_sync, Pipeline};

/// Operator factories.
pub mod ops {
    pub use lazyflow_operators::*;
}

pub mod prelude {
    pub use crate::ops;
    pub use lazyflow_core::prelude::*;
    pub use lazyflow_exec::{pipe, pipe_async, pipe_sync, Pipeline};
    pub use lazyflow_operators::{ErrorContext, Operator};
}
