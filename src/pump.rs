use crate::error::SourceError;
use crate::metrics::SourceMetrics;
use crate::shared::{Pulled, Shared};
use crate::state::StreamState;
use crossbeam::channel::Sender;
use std::sync::Arc;
use std::thread::{spawn, JoinHandle};
use tracing::debug;

/// Receives what the pump delivers
pub trait Sink<T> {
    /// Deliver the next element, in acceptance order
    fn on_next(&mut self, element: T);

    /// Called once after the last element of a completed stream
    fn on_complete(&mut self) {}

    /// Called once when the stream fails or is cancelled
    fn on_error(&mut self, _error: SourceError) {}
}

/// Event forwarded by the channel sink
#[derive(Debug, Clone)]
pub enum SinkEvent<T> {
    /// One delivered element
    Next(T),
    /// End-of-stream
    Complete,
    /// The stream failed or was cancelled
    Error(SourceError),
}

impl<T> Sink<T> for Sender<SinkEvent<T>> {
    fn on_next(&mut self, element: T) {
        // A closed receiver means nobody is observing anymore.
        let _ = self.send(SinkEvent::Next(element));
    }

    fn on_complete(&mut self) {
        let _ = self.send(SinkEvent::Complete);
    }

    fn on_error(&mut self, error: SourceError) {
        let _ = self.send(SinkEvent::Error(error));
    }
}

impl<T> Sink<T> for Vec<T> {
    fn on_next(&mut self, element: T) {
        self.push(element);
    }
}

/// Where the stream stands after a request
#[derive(Debug, Clone)]
pub enum PumpStatus {
    /// Demand served (or nothing available yet); the stream is still open
    Open,
    /// End-of-stream was signaled to the sink
    Completed,
    /// The failure was signaled to the sink
    Failed(SourceError),
}

impl PumpStatus {
    /// Whether the stream has ended, successfully or not
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Cancels the stream from any thread
pub struct CancelHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CancelHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> CancelHandle<T> {
    /// Fail the stream with [`SourceError::Cancelled`]
    ///
    /// Suspended producers are released with the same error. Returns false
    /// when the stream had already terminated.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }
}

/// Cancels on drop, so a consumer that goes away never strands producers
struct DetachGuard<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Drop for DetachGuard<T> {
    fn drop(&mut self) {
        if self.shared.cancel() {
            debug!("stream pump dropped before the stream terminated");
        }
    }
}

/// The single consumer-side pull loop of one stream
///
/// Each unit of demand withdraws one element and delivers it to the sink.
/// Once a terminal status has been reported it is sticky: further requests
/// return it again without signaling the sink a second time.
pub struct StreamPump<T, S: Sink<T>> {
    guard: DetachGuard<T>,
    sink: S,
    finished: Option<PumpStatus>,
}

impl<T, S: Sink<T>> StreamPump<T, S> {
    pub(crate) fn new(shared: Arc<Shared<T>>, sink: S) -> Self {
        Self {
            guard: DetachGuard { shared },
            sink,
            finished: None,
        }
    }

    fn shared(&self) -> &Shared<T> {
        &self.guard.shared
    }

    /// Deliver up to `n` elements, suspending while the stream is empty
    pub fn request(&mut self, n: u64) -> PumpStatus {
        self.pump(n, true)
    }

    /// Deliver up to `n` elements that are available right now
    pub fn try_request(&mut self, n: u64) -> PumpStatus {
        self.pump(n, false)
    }

    /// Deliver until the stream terminates
    pub fn run(&mut self) -> PumpStatus {
        loop {
            let status = self.request(u64::MAX);
            if status.is_terminal() {
                return status;
            }
        }
    }

    fn pump(&mut self, n: u64, block: bool) -> PumpStatus {
        if let Some(status) = &self.finished {
            return status.clone();
        }

        let mut delivered = 0;
        while delivered < n {
            match self.shared().pull(block) {
                Pulled::Element(element) => {
                    self.sink.on_next(element);
                    self.shared().metrics().record_delivered();
                    delivered += 1;
                }
                Pulled::Empty => break,
                Pulled::Completed => {
                    debug!("signaling end-of-stream");
                    self.sink.on_complete();
                    return self.finish(PumpStatus::Completed);
                }
                Pulled::Failed(error) => {
                    debug!(%error, "signaling stream failure");
                    self.sink.on_error(error.clone());
                    return self.finish(PumpStatus::Failed(error));
                }
            }
        }
        PumpStatus::Open
    }

    fn finish(&mut self, status: PumpStatus) -> PumpStatus {
        self.finished = Some(status.clone());
        status
    }

    /// Cancel the stream and signal the sink
    pub fn cancel(&mut self) -> PumpStatus {
        self.shared().cancel();
        self.pump(1, false)
    }

    /// Handle for cancelling from another thread
    pub fn cancel_handle(&self) -> CancelHandle<T> {
        CancelHandle {
            shared: Arc::clone(&self.guard.shared),
        }
    }

    /// Current stream state
    pub fn state(&self) -> StreamState {
        self.shared().state()
    }

    /// Credit currently available to producers
    pub fn credit(&self) -> usize {
        self.shared().credit()
    }

    /// Metrics shared with the endpoint
    pub fn metrics(&self) -> &SourceMetrics {
        self.shared().metrics()
    }

    /// Borrow the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Take the sink back, cancelling the stream if it is still running
    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<T, S> StreamPump<T, S>
where
    T: Send + 'static,
    S: Sink<T> + Send + 'static,
{
    /// Run the pump on its own thread until the stream terminates
    pub fn spawn(mut self) -> JoinHandle<(PumpStatus, S)> {
        spawn(move || {
            let status = self.run();
            (status, self.into_sink())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::signal::SignalMatcher;
    use crate::source::materialize;
    use crate::OverflowPolicy;

    /// Counts every signal so double delivery would show up
    #[derive(Default)]
    struct Recorder {
        elements: Vec<u32>,
        completions: usize,
        errors: Vec<SourceError>,
    }

    impl Sink<u32> for Recorder {
        fn on_next(&mut self, element: u32) {
            self.elements.push(element);
        }

        fn on_complete(&mut self) {
            self.completions += 1;
        }

        fn on_error(&mut self, error: SourceError) {
            self.errors.push(error);
        }
    }

    fn stream() -> (crate::Endpoint<u32>, StreamPump<u32, Recorder>) {
        materialize(
            SourceConfig::new(8, OverflowPolicy::DropNew),
            SignalMatcher::new(),
            Recorder::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_try_request_on_empty_stream_is_open() {
        let (_endpoint, mut pump) = stream();
        assert!(matches!(pump.try_request(3), PumpStatus::Open));
        assert!(pump.sink().elements.is_empty());
    }

    #[test]
    fn test_request_respects_demand() {
        let (endpoint, mut pump) = stream();
        for i in 0..5 {
            endpoint.send(i).unwrap();
        }
        assert!(matches!(pump.request(2), PumpStatus::Open));
        assert_eq!(pump.sink().elements, vec![0, 1]);
        assert!(matches!(pump.request(0), PumpStatus::Open));
        assert_eq!(endpoint.buffered(), 3);
    }

    #[test]
    fn test_terminal_signaled_once() {
        let (endpoint, mut pump) = stream();
        endpoint.send(1).unwrap();
        endpoint.complete().unwrap();

        assert!(matches!(pump.run(), PumpStatus::Completed));
        assert!(matches!(pump.request(4), PumpStatus::Completed));
        assert!(matches!(pump.cancel(), PumpStatus::Completed));

        let sink = pump.into_sink();
        assert_eq!(sink.elements, vec![1]);
        assert_eq!(sink.completions, 1);
        assert!(sink.errors.is_empty());
    }

    #[test]
    fn test_cancel_signals_sink() {
        let (endpoint, mut pump) = stream();
        endpoint.send(1).unwrap();

        assert!(matches!(pump.cancel(), PumpStatus::Failed(SourceError::Cancelled)));
        assert!(matches!(pump.state(), StreamState::Failed(SourceError::Cancelled)));
        let sink = pump.into_sink();
        assert!(sink.elements.is_empty());
        assert_eq!(sink.errors.len(), 1);
        assert_eq!(sink.completions, 0);
    }

    #[test]
    fn test_cancel_during_drain() {
        let (endpoint, mut pump) = stream();
        endpoint.send(1).unwrap();
        endpoint.send(2).unwrap();
        endpoint.complete().unwrap();
        assert!(matches!(pump.request(1), PumpStatus::Open));

        assert!(matches!(pump.cancel(), PumpStatus::Failed(SourceError::Cancelled)));
        assert_eq!(pump.sink().elements, vec![1]);
    }
}
