//! Classification of incoming values into payload and control signals.

use crate::error::FailureCause;
use serde::{Deserialize, Serialize};

/// How the stream finishes once a completion signal is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStrategy {
    /// Stop accepting sends, deliver everything already buffered, then end
    #[default]
    Draining,
    /// Discard the buffer and end at the consumer's next pull
    Immediately,
}

/// Result of classifying one incoming value
#[derive(Debug, Clone)]
pub enum Signal {
    /// Payload to be buffered
    Ordinary,
    /// End of stream; `None` defers to the stream's configured strategy
    Completion(Option<CompletionStrategy>),
    /// Failure, with its cause if the value carried one
    Failure(Option<FailureCause>),
}

/// A value tagged by the sender as payload or control signal
#[derive(Debug, Clone)]
pub enum Message<T> {
    /// Payload to be buffered
    Element(T),
    /// Complete the stream with this strategy
    Complete(CompletionStrategy),
    /// Fail the stream
    Fail(Option<FailureCause>),
}

// Outer option: matched or not. Inner option: the strategy or cause, if any.
type CompletionPredicate<T> =
    Box<dyn Fn(&T) -> Option<Option<CompletionStrategy>> + Send + Sync>;
type FailurePredicate<T> = Box<dyn Fn(&T) -> Option<Option<FailureCause>> + Send + Sync>;

/// Caller-supplied predicate pair recognizing completion and failure values
///
/// Both predicates are optional; with neither set every value is ordinary.
pub struct SignalMatcher<T> {
    completion: Option<CompletionPredicate<T>>,
    failure: Option<FailurePredicate<T>>,
}

impl<T> SignalMatcher<T> {
    /// A matcher that treats every value as ordinary payload
    pub fn new() -> Self {
        Self {
            completion: None,
            failure: None,
        }
    }

    /// Recognize completion values, finishing with the configured strategy
    pub fn with_completion<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.completion = Some(Box::new(move |value: &T| {
            predicate(value).then_some(None::<CompletionStrategy>)
        }));
        self
    }

    /// Recognize completion values and pick the strategy per value
    ///
    /// `Some(strategy)` marks the value as a completion signal.
    pub fn with_completion_strategy<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> Option<CompletionStrategy> + Send + Sync + 'static,
    {
        self.completion = Some(Box::new(move |value: &T| predicate(value).map(Some)));
        self
    }

    /// Recognize failure values and extract their cause
    ///
    /// `Some(cause)` marks the value as a failure signal.
    pub fn with_failure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> Option<FailureCause> + Send + Sync + 'static,
    {
        self.failure = Some(Box::new(move |value: &T| predicate(value).map(Some)));
        self
    }

    /// Recognize failure values that carry no cause
    pub fn with_failure_flag<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.failure = Some(Box::new(move |value: &T| {
            predicate(value).then_some(None::<FailureCause>)
        }));
        self
    }

    /// Classify a value. Failure wins when both predicates match.
    pub fn classify(&self, value: &T) -> Signal {
        if let Some(failure) = &self.failure {
            if let Some(cause) = failure(value) {
                return Signal::Failure(cause);
            }
        }
        match self.completion.as_ref().and_then(|completion| completion(value)) {
            Some(strategy) => Signal::Completion(strategy),
            None => Signal::Ordinary,
        }
    }
}

impl<T> Default for SignalMatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}
