//! Convenient re-exports for downstream crates.

pub use crate::config::PipeConfig;
pub use crate::convert::{to_async, to_iterable, Pulled};
pub use crate::error::{PipeError, Result};
pub use crate::seq::{AsyncIter, Capability, Item, Nested, Pending, Seq, SyncIter};
pub use crate::state::IterState;
