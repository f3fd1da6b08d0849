#![forbid(unsafe_code)]
//! lazyflow-exec: pipeline entry points and tracing hooks.
//!
//! `pipe` / `pipe_sync` / `pipe_async` (and the `pipe!` macro) compose a
//! source with operators from `lazyflow-operators` into a `Pipeline`, which
//! adds `first`, `catch` and config-driven tracing/timeouts on top of `Seq`.

pub mod metrics;
pub mod pipeline;

pub use pipeline::{pipe, pipe_async, pipe_sync, Pipeline};
