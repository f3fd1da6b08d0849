use std::sync::Arc;

use thiserror::Error;

use crate::seq::Capability;

/// Result type shared by every pull in the engine.
pub type Result<T> = std::result::Result<T, PipeError>;

/// Every failure a pull can produce.
///
/// Construction never fails: configuration and mode errors are carried by a
/// sentinel sequence and surface on the first pull, so a `catch_error`
/// further down the chain can intercept them like any other failure.
#[derive(Debug, Clone, Error)]
pub enum PipeError {
    #[error("invalid configuration for `{op}`: {msg}")]
    Config { op: &'static str, msg: String },

    #[error("operator `{op}` requires an asynchronous pipeline")]
    AsyncOnly { op: &'static str },

    #[error("{context}: expected a {expected} sequence, found {found}")]
    ModeMismatch {
        context: &'static str,
        expected: Capability,
        found: Capability,
    },

    #[error("{op}: value at index {index} is not a sequence")]
    NotSequence { op: &'static str, index: usize },

    #[error("reduce of empty sequence with no initial value")]
    EmptyReduce,

    #[error("pull timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("{0}")]
    Message(String),

    #[error("{0}")]
    User(Arc<dyn std::error::Error + Send + Sync>),
}

impl PipeError {
    pub fn msg(msg: impl Into<String>) -> Self {
        PipeError::Message(msg.into())
    }

    pub fn config(op: &'static str, msg: impl Into<String>) -> Self {
        PipeError::Config {
            op,
            msg: msg.into(),
        }
    }

    /// Wrap an arbitrary error raised by user code.
    pub fn user<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PipeError::User(Arc::new(err))
    }

    /// Loose "same failure again" check used for repeat detection.
    ///
    /// Two user errors are the same when they share the allocation; anything
    /// else falls back to comparing rendered messages.
    pub fn same_as(&self, other: &PipeError) -> bool {
        if let (PipeError::User(a), PipeError::User(b)) = (self, other) {
            if Arc::ptr_eq(a, b) {
                return true;
            }
        }
        self.to_string() == other.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct Fire;

    #[test]
    fn same_as_matches_shared_user_error() {
        let e = PipeError::user(Fire);
        assert!(e.same_as(&e.clone()));
    }

    #[test]
    fn same_as_falls_back_to_message() {
        assert!(PipeError::msg("boom").same_as(&PipeError::msg("boom")));
        assert!(!PipeError::msg("boom").same_as(&PipeError::msg("bang")));
        // distinct allocations, same rendering
        assert!(PipeError::user(Fire).same_as(&PipeError::user(Fire)));
    }

    #[test]
    fn messages_name_the_operator() {
        let e = PipeError::AsyncOnly { op: "delay" };
        assert_eq!(e.to_string(), "operator `delay` requires an asynchronous pipeline");
        let e = PipeError::NotSequence {
            op: "spread",
            index: 3,
        };
        assert_eq!(e.to_string(), "spread: value at index 3 is not a sequence");
    }
}
