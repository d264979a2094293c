//! The single critical section joining buffer, credit and stream state.
//!
//! Producers (through [`crate::Endpoint`]) and the one consumer (through
//! [`crate::StreamPump`]) only ever touch stream state while holding the
//! mutex in [`Shared`], which keeps the capacity and ordering invariants.

use crate::backpressure::{Ack, BackpressureController, Permit};
use crate::buffer::{Buffer, Offer};
use crate::config::SourceConfig;
use crate::endpoint::Sent;
use crate::error::{SendError, SourceError};
use crate::metrics::SourceMetrics;
use crate::signal::{CompletionStrategy, SignalMatcher};
use crate::state::StreamState;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace, warn};

/// Whether a gated send may suspend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendMode {
    Block,
    Try,
}

/// What one pull from the consumer side produced
#[derive(Debug)]
pub(crate) enum Pulled<T> {
    Element(T),
    /// Nothing buffered and the stream is still active (non-blocking pulls only)
    Empty,
    Completed,
    Failed(SourceError),
}

struct Inner<T> {
    buffer: Buffer<T>,
    controller: BackpressureController<T>,
    state: StreamState,
    /// Direct hand-off slot for zero-capacity streams
    handoff: Option<T>,
    pump_waiting: bool,
}

impl<T> Inner<T> {
    fn has_room(&self) -> bool {
        self.buffer.has_room()
            || (self.buffer.capacity() == 0 && self.pump_waiting && self.handoff.is_none())
    }

    /// Place an element the caller already checked there is room for
    fn store(&mut self, element: T) {
        if let Err(element) = self.buffer.push(element) {
            debug_assert!(self.handoff.is_none());
            self.handoff = Some(element);
        }
    }

    fn withdraw(&mut self, metrics: &SourceMetrics) -> Option<T> {
        let element = self.handoff.take().or_else(|| self.buffer.withdraw())?;
        self.controller.replenish(1);
        self.admit_waiters(metrics);
        Some(element)
    }

    /// Buffer parked elements while credit and room last, acknowledging each
    fn admit_waiters(&mut self, metrics: &SourceMetrics) -> usize {
        let mut admitted = 0;
        loop {
            let room = self.has_room();
            let Some((element, token)) = self.controller.admit(room) else {
                break;
            };
            self.store(element);
            token.acknowledge();
            metrics.record_accepted();
            admitted += 1;
        }
        admitted
    }

    /// Discard everything still owned by the stream
    fn discard(&mut self) -> usize {
        self.buffer.discard() + usize::from(self.handoff.take().is_some())
    }

    fn transition(&mut self, next: StreamState) -> bool {
        if !self.state.can_transition_to(&next) {
            return false;
        }
        debug!(from = self.state.name(), to = next.name(), "stream state transition");
        self.state = next;
        true
    }
}

/// Per-stream state shared by every endpoint clone and the pump
pub(crate) struct Shared<T> {
    inner: Mutex<Inner<T>>,
    data_ready: Condvar,
    matcher: SignalMatcher<T>,
    gated: bool,
    completion_strategy: CompletionStrategy,
    metrics: SourceMetrics,
    endpoints: AtomicUsize,
}

impl<T> Shared<T> {
    pub(crate) fn new(config: &SourceConfig, matcher: SignalMatcher<T>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: Buffer::new(config.capacity, config.overflow_policy),
                controller: BackpressureController::new(config.initial_credit),
                state: StreamState::Active,
                handoff: None,
                pump_waiting: false,
            }),
            data_ready: Condvar::new(),
            matcher,
            gated: config.overflow_policy.is_backpressure(),
            completion_strategy: config.completion_strategy,
            metrics: SourceMetrics::new(),
            endpoints: AtomicUsize::new(0),
        }
    }

    pub(crate) fn matcher(&self) -> &SignalMatcher<T> {
        &self.matcher
    }

    pub(crate) fn completion_strategy(&self) -> CompletionStrategy {
        self.completion_strategy
    }

    pub(crate) fn metrics(&self) -> &SourceMetrics {
        &self.metrics
    }

    /// Offer one ordinary element
    pub(crate) fn offer(&self, element: T, mode: SendMode) -> Result<Sent<T>, SendError<T>> {
        let mut inner = self.inner.lock();
        if !inner.state.accepts_sends() {
            self.metrics.record_rejected();
            return Err(SendError::new(Some(element), SourceError::StreamClosed));
        }

        if self.gated {
            return self.offer_gated(inner, element, mode);
        }

        if inner.buffer.capacity() == 0 && inner.has_room() {
            inner.store(element);
            self.metrics.record_accepted();
            self.data_ready.notify_one();
            return Ok(Sent::Accepted);
        }

        match inner.buffer.offer(element) {
            Offer::Accepted => {
                self.metrics.record_accepted();
                self.data_ready.notify_one();
                Ok(Sent::Accepted)
            }
            Offer::Evicted(evicted) => {
                trace!(count = evicted.len(), "evicted buffered elements on overflow");
                self.metrics.record_accepted();
                self.metrics.record_dropped(evicted.len());
                self.data_ready.notify_one();
                Ok(Sent::AcceptedEvicting(evicted))
            }
            Offer::Dropped(element) => {
                trace!("dropped incoming element on overflow");
                self.metrics.record_dropped(1);
                Ok(Sent::Dropped(element))
            }
            Offer::Overflow(element) => {
                let error = SourceError::CapacityExceeded {
                    capacity: inner.buffer.capacity(),
                };
                warn!(capacity = inner.buffer.capacity(), "buffer overflow, failing stream");
                self.fail_locked(&mut inner, error.clone());
                self.metrics.record_rejected();
                Err(SendError::new(Some(element), error))
            }
        }
    }

    fn offer_gated(
        &self,
        mut inner: parking_lot::MutexGuard<'_, Inner<T>>,
        element: T,
        mode: SendMode,
    ) -> Result<Sent<T>, SendError<T>> {
        let room = inner.has_room();
        if inner.controller.try_accept(room) == Permit::Granted {
            inner.store(element);
            self.metrics.record_accepted();
            self.data_ready.notify_one();
            return Ok(Sent::Accepted);
        }

        if mode == SendMode::Try {
            self.metrics.record_rejected();
            return Err(SendError::new(Some(element), SourceError::WouldBlock));
        }

        // Parked under the lock so the acknowledgement cannot be missed.
        let receiver = inner.controller.park(element);
        let waiting = inner.controller.waiting();
        drop(inner);

        trace!(waiting, "producer suspended awaiting acknowledgement");
        self.metrics.record_wait();
        match receiver.recv() {
            Some(Ack::Granted) => {
                self.metrics.record_ack_wait(receiver.waited());
                Ok(Sent::Accepted)
            }
            Some(Ack::Terminated { element, error }) => {
                self.metrics.record_rejected();
                Err(SendError::new(Some(element), error))
            }
            None => {
                self.metrics.record_rejected();
                Err(SendError::new(None, SourceError::StreamClosed))
            }
        }
    }

    /// Observe a completion signal
    pub(crate) fn complete(&self, strategy: CompletionStrategy) -> Result<(), SourceError> {
        let mut inner = self.inner.lock();
        if !inner.state.accepts_sends() {
            self.metrics.record_rejected();
            return Err(SourceError::StreamClosed);
        }
        self.complete_locked(&mut inner, strategy);
        Ok(())
    }

    fn complete_locked(&self, inner: &mut Inner<T>, strategy: CompletionStrategy) {
        let next = match strategy {
            CompletionStrategy::Draining => StreamState::Draining,
            CompletionStrategy::Immediately => StreamState::Completed,
        };
        if !inner.transition(next) {
            return;
        }
        if strategy == CompletionStrategy::Immediately {
            let discarded = inner.discard();
            self.metrics.record_discarded(discarded);
        }
        let released = inner.controller.terminate(&SourceError::StreamClosed);
        debug!(?strategy, buffered = inner.buffer.len(), released, "completion observed");
        self.data_ready.notify_all();
    }

    /// Observe a failure signal or an overflow failure
    pub(crate) fn fail(&self, error: SourceError) -> Result<(), SourceError> {
        let mut inner = self.inner.lock();
        if !inner.state.accepts_sends() {
            self.metrics.record_rejected();
            return Err(SourceError::StreamClosed);
        }
        self.fail_locked(&mut inner, error);
        Ok(())
    }

    /// Consumer-side cancellation; legal from any non-terminal state
    pub(crate) fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        let cancelled = self.fail_locked(&mut inner, SourceError::Cancelled);
        if cancelled {
            warn!("stream cancelled by consumer");
        }
        cancelled
    }

    fn fail_locked(&self, inner: &mut Inner<T>, error: SourceError) -> bool {
        if !inner.transition(StreamState::Failed(error.clone())) {
            return false;
        }
        let discarded = inner.discard();
        self.metrics.record_discarded(discarded);
        let released = inner.controller.terminate(&error);
        debug!(%error, discarded, released, "stream failed");
        self.data_ready.notify_all();
        true
    }

    /// Withdraw the next element for the pump
    ///
    /// With `block` set, suspends while the stream is active and empty.
    pub(crate) fn pull(&self, block: bool) -> Pulled<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(element) = inner.withdraw(&self.metrics) {
                return Pulled::Element(element);
            }

            match &inner.state {
                StreamState::Active => {
                    if !block {
                        return Pulled::Empty;
                    }
                    inner.pump_waiting = true;
                    // A zero-capacity stream can only admit parked producers now.
                    if inner.admit_waiters(&self.metrics) == 0 {
                        self.data_ready.wait(&mut inner);
                    }
                    inner.pump_waiting = false;
                }
                StreamState::Draining => {
                    inner.transition(StreamState::Completed);
                    return Pulled::Completed;
                }
                StreamState::Completed => return Pulled::Completed,
                StreamState::Failed(error) => return Pulled::Failed(error.clone()),
            }
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.inner.lock().state.clone()
    }

    pub(crate) fn buffered(&self) -> usize {
        let inner = self.inner.lock();
        inner.buffer.len() + usize::from(inner.handoff.is_some())
    }

    pub(crate) fn credit(&self) -> usize {
        self.inner.lock().controller.credit()
    }

    pub(crate) fn waiting_producers(&self) -> usize {
        self.inner.lock().controller.waiting()
    }

    pub(crate) fn attach_endpoint(&self) {
        self.endpoints.fetch_add(1, Ordering::AcqRel);
    }

    /// Complete the stream once the last endpoint goes away
    pub(crate) fn detach_endpoint(&self) {
        if self.endpoints.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.state.accepts_sends() {
            debug!("last endpoint dropped, draining stream");
            self.complete_locked(&mut inner, CompletionStrategy::Draining);
        }
    }
}
