use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Cause attached to an upstream failure
#[derive(Clone)]
pub struct FailureCause(Arc<dyn std::error::Error + Send + Sync>);

impl FailureCause {
    /// Wrap an existing error
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Build a cause from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        let boxed: Box<dyn std::error::Error + Send + Sync> = message.into().into();
        Self(Arc::from(boxed))
    }

    /// Borrow the underlying error
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }
}

impl fmt::Debug for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn describe(cause: &Option<FailureCause>) -> String {
    match cause {
        Some(cause) => format!(": {cause}"),
        None => String::new(),
    }
}

/// Errors surfaced to producers and to the consumer
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The fail-stream overflow policy was triggered
    #[error("Buffer capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    /// Send attempted after the stream stopped accepting elements
    #[error("Stream is closed")]
    StreamClosed,

    /// A failure signal was observed or injected
    #[error("Upstream failure{}", describe(.0))]
    UpstreamFailure(Option<FailureCause>),

    /// The consumer cancelled the stream
    #[error("Stream cancelled by consumer")]
    Cancelled,

    /// Non-blocking send refused because it would have to wait
    ///
    /// Raised for missing credit, a full buffer, or producers already
    /// suspended ahead of the sender.
    #[error("Send would block")]
    WouldBlock,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SourceError {
    /// Whether this error describes a terminal stream state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::UpstreamFailure(_) | Self::Cancelled
        )
    }
}

/// A send that was not accepted
///
/// Carries the element back to the caller whenever the core still owned it,
/// so a producer can retry elsewhere.
pub struct SendError<T> {
    element: Option<T>,
    error: SourceError,
}

impl<T> SendError<T> {
    pub(crate) fn new(element: Option<T>, error: SourceError) -> Self {
        Self { element, error }
    }

    /// The reason the send was rejected
    pub fn error(&self) -> &SourceError {
        &self.error
    }

    /// Take back the element that was not accepted
    pub fn into_element(self) -> Option<T> {
        self.element
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError")
            .field("error", &self.error)
            .field("has_element", &self.element.is_some())
            .finish()
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send rejected: {}", self.error)
    }
}

impl<T> std::error::Error for SendError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
