use crate::error::{FailureCause, SendError, SourceError};
use crate::metrics::SourceMetrics;
use crate::shared::{SendMode, Shared};
use crate::signal::{CompletionStrategy, Message, Signal};
use crate::state::StreamState;
use std::fmt;
use std::sync::Arc;

/// What happened to a successfully submitted value
#[derive(Debug, PartialEq, Eq)]
pub enum Sent<T> {
    /// The element was buffered (and acknowledged, under backpressure)
    Accepted,
    /// The element was buffered after evicting these elements, oldest first
    AcceptedEvicting(Vec<T>),
    /// The incoming element was discarded by the drop-new policy
    Dropped(T),
    /// The value was a completion or failure signal and drove a state transition
    Signal,
}

impl<T> Sent<T> {
    /// Whether the submitted element ended up in the buffer
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::AcceptedEvicting(_))
    }
}

/// Externally addressable handle producers send to
///
/// Cheap to clone; every clone feeds the same stream. When the last clone is
/// dropped while the stream is still active, the stream drains and completes.
pub struct Endpoint<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Endpoint<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        shared.attach_endpoint();
        Self { shared }
    }

    /// Send a value, classifying it with the stream's signal matcher
    ///
    /// Under the backpressure policy this blocks until the element is
    /// acknowledged, or until the stream terminates, in which case the
    /// element is handed back in the error.
    pub fn send(&self, value: T) -> Result<Sent<T>, SendError<T>> {
        self.dispatch(value, SendMode::Block)
    }

    /// Like [`Endpoint::send`] but never suspends
    ///
    /// Under backpressure, whenever the send would have to wait the element
    /// comes back with [`SourceError::WouldBlock`]. That covers no credit left,
    /// a full buffer, and other producers already suspended ahead of this one.
    pub fn try_send(&self, value: T) -> Result<Sent<T>, SendError<T>> {
        self.dispatch(value, SendMode::Try)
    }

    fn dispatch(&self, value: T, mode: SendMode) -> Result<Sent<T>, SendError<T>> {
        match self.shared.matcher().classify(&value) {
            Signal::Ordinary => self.shared.offer(value, mode),
            Signal::Completion(strategy) => self
                .shared
                .complete(strategy.unwrap_or_else(|| self.shared.completion_strategy()))
                .map(|()| Sent::Signal)
                .map_err(|error| SendError::new(Some(value), error)),
            Signal::Failure(cause) => self
                .shared
                .fail(SourceError::UpstreamFailure(cause))
                .map(|()| Sent::Signal)
                .map_err(|error| SendError::new(Some(value), error)),
        }
    }

    /// Send a value already tagged as payload or signal
    pub fn tell(&self, message: Message<T>) -> Result<Sent<T>, SendError<T>> {
        match message {
            Message::Element(element) => self.shared.offer(element, SendMode::Block),
            Message::Complete(strategy) => self
                .shared
                .complete(strategy)
                .map(|()| Sent::Signal)
                .map_err(|error| SendError::new(None, error)),
            Message::Fail(cause) => self
                .shared
                .fail(SourceError::UpstreamFailure(cause))
                .map(|()| Sent::Signal)
                .map_err(|error| SendError::new(None, error)),
        }
    }

    /// Complete the stream with the configured strategy
    pub fn complete(&self) -> Result<(), SourceError> {
        self.shared.complete(self.shared.completion_strategy())
    }

    /// Complete the stream with an explicit strategy
    pub fn complete_with(&self, strategy: CompletionStrategy) -> Result<(), SourceError> {
        self.shared.complete(strategy)
    }

    /// Fail the stream, discarding anything still buffered
    pub fn fail(&self, cause: Option<FailureCause>) -> Result<(), SourceError> {
        self.shared.fail(SourceError::UpstreamFailure(cause))
    }

    /// Current stream state
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Number of elements buffered and not yet withdrawn
    pub fn buffered(&self) -> usize {
        self.shared.buffered()
    }

    /// Number of producers suspended awaiting an acknowledgement
    pub fn waiting_producers(&self) -> usize {
        self.shared.waiting_producers()
    }

    /// Metrics shared with the pump
    pub fn metrics(&self) -> &SourceMetrics {
        self.shared.metrics()
    }
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.shared))
    }
}

impl<T> Drop for Endpoint<T> {
    fn drop(&mut self) {
        self.shared.detach_endpoint();
    }
}

impl<T> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("state", &self.shared.state().name())
            .field("buffered", &self.shared.buffered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::signal::SignalMatcher;
    use crate::source::materialize;
    use crate::OverflowPolicy;

    type Pump = crate::StreamPump<&'static str, Vec<&'static str>>;

    fn stream(policy: OverflowPolicy) -> (Endpoint<&'static str>, Pump) {
        let matcher = SignalMatcher::new().with_completion(|s: &&str| *s == "complete");
        materialize(SourceConfig::new(2, policy), matcher, Vec::new()).unwrap()
    }

    #[test]
    fn test_sent_is_accepted() {
        assert!(Sent::<u8>::Accepted.is_accepted());
        assert!(Sent::AcceptedEvicting(vec![1u8]).is_accepted());
        assert!(!Sent::Dropped(1u8).is_accepted());
        assert!(!Sent::<u8>::Signal.is_accepted());
    }

    #[test]
    fn test_completion_value_is_never_buffered() {
        let (endpoint, _pump) = stream(OverflowPolicy::DropNew);
        endpoint.send("hello").unwrap();
        assert_eq!(endpoint.send("complete").unwrap(), Sent::Signal);
        assert_eq!(endpoint.buffered(), 1);
        assert!(matches!(endpoint.state(), StreamState::Draining));
    }

    #[test]
    fn test_signal_on_closed_stream_returns_value() {
        let (endpoint, _pump) = stream(OverflowPolicy::DropNew);
        endpoint.complete().unwrap();
        let err = endpoint.send("complete").unwrap_err();
        assert!(matches!(err.error(), SourceError::StreamClosed));
        assert_eq!(err.into_element(), Some("complete"));
        assert!(matches!(endpoint.complete(), Err(SourceError::StreamClosed)));
        assert!(matches!(endpoint.fail(None), Err(SourceError::StreamClosed)));
    }

    #[test]
    fn test_clones_share_stream() {
        let (endpoint, _pump) = stream(OverflowPolicy::DropOldest);
        let other = endpoint.clone();
        other.send("a").unwrap();
        endpoint.send("b").unwrap();
        assert_eq!(endpoint.buffered(), 2);
        assert_eq!(other.metrics().total_accepted(), 2);

        drop(other);
        assert!(matches!(endpoint.state(), StreamState::Active));
    }

    #[test]
    fn test_rejections_are_counted() {
        let (endpoint, _pump) = stream(OverflowPolicy::Fail);
        endpoint.send("a").unwrap();
        endpoint.send("b").unwrap();
        assert!(endpoint.send("c").is_err());
        assert!(endpoint.send("d").is_err());
        assert_eq!(endpoint.metrics().total_rejected(), 2);
    }
}
