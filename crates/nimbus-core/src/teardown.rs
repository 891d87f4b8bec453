//! Teardown failure aggregation

use crate::plugin::{PluginError, PluginKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What `close()` does with plugin teardown failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownPolicy {
    /// Collect every failure and report them together to the caller
    #[default]
    Collect,

    /// Log every failure at `warn` and report success
    Log,
}

/// A single plugin that failed to close
#[derive(Debug)]
pub struct TeardownFailure {
    /// Plugin key
    pub key: PluginKey,

    /// Error returned by the plugin's close hook
    pub error: PluginError,
}

/// Aggregated teardown failures from one `close_all` pass
///
/// Only plugins whose close hook failed appear here; plugins that closed
/// cleanly during the same pass are never listed.
#[derive(Debug, Default)]
pub struct TeardownError {
    failures: Vec<TeardownFailure>,
}

impl TeardownError {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed plugin
    pub fn push(&mut self, key: PluginKey, error: PluginError) {
        self.failures.push(TeardownFailure { key, error });
    }

    /// All recorded failures, in teardown order
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Keys of the plugins that failed
    pub fn failed_keys(&self) -> impl Iterator<Item = &PluginKey> {
        self.failures.iter().map(|f| &f.key)
    }

    /// Check if the given plugin failed
    pub fn contains(&self, key: &str) -> bool {
        self.failures.iter().any(|f| f.key.as_str() == key)
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Check if no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Ok(())` when nothing failed, `Err(self)` otherwise
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for TeardownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} plugin(s) failed to close", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}'{}' ({})", failure.key, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownError {}
