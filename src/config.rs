//! Recognized options for a materialized source.

use crate::buffer::OverflowPolicy;
use crate::error::{Result, SourceError};
use crate::signal::CompletionStrategy;
use serde::{Deserialize, Serialize};

/// Default buffer capacity
pub const DEFAULT_CAPACITY: usize = 16;

/// Serializable configuration of one source
///
/// Completion and failure predicates are code, not data; they are supplied
/// separately through [`crate::SignalMatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceConfig {
    /// Maximum number of buffered elements; 0 disables buffering
    pub capacity: usize,
    /// Rule applied when the buffer is full
    pub overflow_policy: OverflowPolicy,
    /// Credit granted when the stream starts; only used under backpressure
    pub initial_credit: usize,
    /// How a completion signal finishes the stream
    pub completion_strategy: CompletionStrategy,
}

impl SourceConfig {
    /// Configuration with the given capacity and policy, other options default
    pub fn new(capacity: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            capacity,
            overflow_policy,
            ..Self::default()
        }
    }

    /// Check the options can produce a working stream
    pub fn validate(&self) -> Result<()> {
        if self.overflow_policy.is_backpressure() && self.initial_credit == 0 {
            return Err(SourceError::ConfigError(
                "initial credit must be at least 1 under the backpressure policy".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            overflow_policy: OverflowPolicy::Backpressure,
            initial_credit: DEFAULT_CAPACITY,
            completion_strategy: CompletionStrategy::Draining,
        }
    }
}
