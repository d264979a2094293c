use crate::buffer::OverflowPolicy;
use crate::config::SourceConfig;
use crate::endpoint::Endpoint;
use crate::error::{FailureCause, Result};
use crate::pump::{Sink, StreamPump};
use crate::shared::Shared;
use crate::signal::{CompletionStrategy, SignalMatcher};
use std::sync::Arc;
use tracing::debug;

/// Builder for materializing a source
pub struct SourceBuilder<T> {
    config: SourceConfig,
    matcher: SignalMatcher<T>,
}

impl<T> SourceBuilder<T> {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::from_config(SourceConfig::default())
    }

    /// Start from an existing configuration
    pub fn from_config(config: SourceConfig) -> Self {
        Self {
            config,
            matcher: SignalMatcher::new(),
        }
    }

    /// Set the buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    /// Set the credit granted at start under the backpressure policy
    pub fn initial_credit(mut self, credit: usize) -> Self {
        self.config.initial_credit = credit;
        self
    }

    /// Set how completion signals finish the stream
    pub fn completion_strategy(mut self, strategy: CompletionStrategy) -> Self {
        self.config.completion_strategy = strategy;
        self
    }

    /// Recognize completion values sent through [`Endpoint::send`]
    pub fn completion_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.matcher = self.matcher.with_completion(predicate);
        self
    }

    /// Recognize failure values sent through [`Endpoint::send`]
    pub fn failure_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> Option<FailureCause> + Send + Sync + 'static,
    {
        self.matcher = self.matcher.with_failure(predicate);
        self
    }

    /// Replace the whole signal matcher
    pub fn signal_matcher(mut self, matcher: SignalMatcher<T>) -> Self {
        self.matcher = matcher;
        self
    }

    /// The configuration built so far
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Materialize the stream: attach the sink and hand out the endpoint
    pub fn build<S: Sink<T>>(self, sink: S) -> Result<(Endpoint<T>, StreamPump<T, S>)> {
        materialize(self.config, self.matcher, sink)
    }
}

impl<T> Default for SourceBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the endpoint and pump of one stream instance
///
/// All stream state lives behind the returned handles and is released when
/// the last of them is dropped.
pub fn materialize<T, S: Sink<T>>(
    config: SourceConfig,
    matcher: SignalMatcher<T>,
    sink: S,
) -> Result<(Endpoint<T>, StreamPump<T, S>)> {
    config.validate()?;
    debug!(
        capacity = config.capacity,
        policy = ?config.overflow_policy,
        initial_credit = config.initial_credit,
        "materializing source"
    );

    let shared = Arc::new(Shared::new(&config, matcher));
    let endpoint = Endpoint::new(Arc::clone(&shared));
    let pump = StreamPump::new(shared, sink);
    Ok((endpoint, pump))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::state::StreamState;

    #[test]
    fn test_builder_sets_options() {
        let builder = SourceBuilder::<u32>::new()
            .capacity(4)
            .overflow_policy(OverflowPolicy::ClearAll)
            .initial_credit(2)
            .completion_strategy(CompletionStrategy::Immediately);
        let config = builder.config();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.overflow_policy, OverflowPolicy::ClearAll);
        assert_eq!(config.initial_credit, 2);
        assert_eq!(config.completion_strategy, CompletionStrategy::Immediately);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = SourceBuilder::<u32>::new()
            .overflow_policy(OverflowPolicy::Backpressure)
            .initial_credit(0)
            .build(Vec::new());
        assert!(matches!(result, Err(SourceError::ConfigError(_))));
    }

    #[test]
    fn test_materialized_stream_starts_active() {
        let (endpoint, pump) = SourceBuilder::<u32>::new().build(Vec::new()).unwrap();
        assert!(matches!(endpoint.state(), StreamState::Active));
        assert_eq!(endpoint.buffered(), 0);
        assert_eq!(pump.credit(), crate::config::DEFAULT_CAPACITY);
    }
}
