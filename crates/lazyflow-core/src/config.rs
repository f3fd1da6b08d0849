//! Pipeline configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Emit a trace event for every value leaving a configured pipeline.
    pub trace_pulls: bool,

    /// Optional pipeline-wide timeout applied after the last operator.
    pub timeout_ms: Option<u64>,

    /// Concurrency bound used by the `*_default` racing operators.
    pub default_concurrency: usize,

    /// Depth used by `flat_default`.
    pub flat_depth: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            trace_pulls: false,
            timeout_ms: None,
            default_concurrency: 4,
            flat_depth: 1,
        }
    }
}

impl PipeConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `LAZYFLOW_TRACE_PULLS`: `1`/`true` to trace every emitted value
    /// - `LAZYFLOW_TIMEOUT_MS`: pipeline-wide timeout
    /// - `LAZYFLOW_DEFAULT_CONCURRENCY`: bound for `wait_race_default`
    /// - `LAZYFLOW_FLAT_DEPTH`: depth for `flat_default`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading through an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(s) = lookup("LAZYFLOW_TRACE_PULLS") {
            cfg.trace_pulls = matches!(s.trim(), "1" | "true" | "yes" | "on");
        }

        if let Some(s) = lookup("LAZYFLOW_TIMEOUT_MS") {
            if let Ok(v) = s.trim().parse::<u64>() {
                cfg.timeout_ms = Some(v);
            }
        }

        if let Some(s) = lookup("LAZYFLOW_DEFAULT_CONCURRENCY") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.default_concurrency = v;
            }
        }

        if let Some(s) = lookup("LAZYFLOW_FLAT_DEPTH") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.flat_depth = v;
            }
        }

        cfg
    }
}
