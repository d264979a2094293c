use crate::error::SourceError;
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Answer to a producer asking to place one element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Credit taken; the element may be buffered and acknowledged
    Granted,
    /// No credit or no room; the producer must wait for an acknowledgement
    Denied,
}

/// Token delivered to a suspended producer
#[derive(Debug)]
pub enum Ack<T> {
    /// The element was buffered; the producer may send again
    Granted,
    /// The stream ended first; the element comes back with the reason
    Terminated { element: T, error: SourceError },
}

/// A producer parked until credit comes back
struct Waiter<T> {
    element: T,
    ack: Sender<Ack<T>>,
}

/// Receiving half held by the producer that parked
pub struct AckReceiver<T> {
    rx: Receiver<Ack<T>>,
    since: Instant,
}

impl<T> AckReceiver<T> {
    /// Block until this send is acknowledged or terminated
    ///
    /// `None` means the controller was torn down without answering.
    pub fn recv(&self) -> Option<Ack<T>> {
        self.rx.recv().ok()
    }

    /// How long the producer has been waiting
    pub fn waited(&self) -> Duration {
        self.since.elapsed()
    }
}

/// Acknowledgement owed to a producer whose parked element was admitted
pub struct AckToken<T> {
    ack: Sender<Ack<T>>,
}

impl<T> AckToken<T> {
    /// Emit the acknowledgement; call only after the element is buffered
    pub fn acknowledge(self) {
        // The producer may have given up; nobody is left to tell.
        let _ = self.ack.send(Ack::Granted);
    }
}

/// Credit-based flow control with one acknowledgement per accepted send
///
/// Credit starts at the consumer's initial grant, drops by one for every
/// element accepted and comes back one at a time as the pump withdraws.
/// It never goes negative and never exceeds the initial grant.
pub struct BackpressureController<T> {
    credit: usize,
    initial_credit: usize,
    waiters: VecDeque<Waiter<T>>,
}

impl<T> BackpressureController<T> {
    /// Create a controller holding the consumer's initial grant
    pub fn new(initial_credit: usize) -> Self {
        Self {
            credit: initial_credit,
            initial_credit,
            waiters: VecDeque::new(),
        }
    }

    /// Ask for one credit. `room` says whether the buffer can take the element.
    ///
    /// Parked producers are served first, so a fresh send never overtakes them.
    pub fn try_accept(&mut self, room: bool) -> Permit {
        if self.credit > 0 && room && self.waiters.is_empty() {
            self.credit -= 1;
            Permit::Granted
        } else {
            Permit::Denied
        }
    }

    /// Park a denied producer until an acknowledgement is emitted for it
    pub fn park(&mut self, element: T) -> AckReceiver<T> {
        let (ack, rx) = channel::bounded(1);
        self.waiters.push_back(Waiter { element, ack });
        AckReceiver {
            rx,
            since: Instant::now(),
        }
    }

    /// Give back credit after the pump withdrew elements
    pub fn replenish(&mut self, n: usize) {
        self.credit = self.credit.saturating_add(n).min(self.initial_credit);
    }

    /// Take the oldest parked element if credit and room allow it
    pub fn admit(&mut self, room: bool) -> Option<(T, AckToken<T>)> {
        if self.credit == 0 || !room {
            return None;
        }
        let waiter = self.waiters.pop_front()?;
        self.credit -= 1;
        Some((waiter.element, AckToken { ack: waiter.ack }))
    }

    /// Release every parked producer with a terminal notification
    pub fn terminate(&mut self, error: &SourceError) -> usize {
        let released = self.waiters.len();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.ack.send(Ack::Terminated {
                element: waiter.element,
                error: error.clone(),
            });
        }
        released
    }

    /// Credit currently available
    pub fn credit(&self) -> usize {
        self.credit
    }

    /// Number of producers parked awaiting an acknowledgement
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_grant() {
        let mut controller = BackpressureController::<u32>::new(2);
        assert_eq!(controller.try_accept(true), Permit::Granted);
        assert_eq!(controller.try_accept(true), Permit::Granted);
        assert_eq!(controller.try_accept(true), Permit::Denied);
        assert_eq!(controller.credit(), 0);
    }

    #[test]
    fn test_denied_without_room() {
        let mut controller = BackpressureController::<u32>::new(4);
        assert_eq!(controller.try_accept(false), Permit::Denied);
        assert_eq!(controller.credit(), 4);
    }

    #[test]
    fn test_replenish_is_capped() {
        let mut controller = BackpressureController::<u32>::new(2);
        let _ = controller.try_accept(true);
        controller.replenish(5);
        assert_eq!(controller.credit(), 2);
    }

    #[test]
    fn test_parked_producer_is_acknowledged_in_order() {
        let mut controller = BackpressureController::new(1);
        assert_eq!(controller.try_accept(true), Permit::Granted);

        let first = controller.park(10);
        let second = controller.park(20);
        assert_eq!(controller.waiting(), 2);
        assert!(controller.admit(true).is_none());

        // A fresh send may not overtake parked producers.
        controller.replenish(1);
        assert_eq!(controller.try_accept(true), Permit::Denied);

        let (element, token) = controller.admit(true).expect("credit was replenished");
        assert_eq!(element, 10);
        token.acknowledge();
        assert!(matches!(first.recv(), Some(Ack::Granted)));
        assert_eq!(controller.waiting(), 1);
        assert_eq!(controller.credit(), 0);
        drop(second);
    }

    #[test]
    fn test_terminate_returns_elements() {
        let mut controller = BackpressureController::new(0);
        let waiting = controller.park("x");
        assert_eq!(controller.terminate(&SourceError::Cancelled), 1);
        match waiting.recv() {
            Some(Ack::Terminated { element, error }) => {
                assert_eq!(element, "x");
                assert!(matches!(error, SourceError::Cancelled));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(controller.waiting(), 0);
    }
}
