use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Determines how the buffer handles an element arriving while it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the head (oldest) element, then append
    DropOldest,
    /// Evict the current tail (newest pending) element, then append
    DropNewest,
    /// Refuse the incoming element, buffer unchanged
    DropNew,
    /// Empty the buffer, then append
    ClearAll,
    /// Refuse the incoming element and fail the stream
    Fail,
    /// Gate producers on credit and acknowledgements instead of dropping
    #[default]
    Backpressure,
}

/// What the buffer should do on overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowAction {
    /// Remove the oldest element, then append
    EvictHead,
    /// Remove the newest buffered element, then append
    EvictTail,
    /// Discard the incoming element
    RefuseIncoming,
    /// Empty the buffer, then append
    EvictAll,
    /// Refuse the element and fail the stream
    FailStream,
    /// Leave the element to the backpressure controller
    Defer,
}

impl OverflowPolicy {
    /// Decide how to resolve an overflow
    pub fn on_overflow(self) -> OverflowAction {
        match self {
            Self::DropOldest => OverflowAction::EvictHead,
            Self::DropNewest => OverflowAction::EvictTail,
            Self::DropNew => OverflowAction::RefuseIncoming,
            Self::ClearAll => OverflowAction::EvictAll,
            Self::Fail => OverflowAction::FailStream,
            Self::Backpressure => OverflowAction::Defer,
        }
    }

    /// Whether producers are gated by the backpressure controller
    pub fn is_backpressure(self) -> bool {
        matches!(self, Self::Backpressure)
    }
}

/// Outcome of offering an element to the buffer
#[derive(Debug, PartialEq, Eq)]
pub enum Offer<T> {
    /// Appended without displacing anything
    Accepted,
    /// Appended after evicting the returned elements (oldest first)
    Evicted(Vec<T>),
    /// The incoming element was discarded
    Dropped(T),
    /// Buffer is full and the policy leaves the decision to the caller
    Overflow(T),
}

/// Bounded FIFO of pending elements
///
/// Not synchronized on its own: the stream's critical section owns it, so
/// producers and the pump never touch it concurrently.
#[derive(Debug)]
pub struct Buffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> Buffer<T> {
    /// Create a new buffer with the specified capacity and overflow policy
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            policy,
        }
    }

    /// Append only if there is room, handing the element back otherwise
    pub fn push(&mut self, element: T) -> Result<(), T> {
        if self.has_room() {
            self.items.push_back(element);
            Ok(())
        } else {
            Err(element)
        }
    }

    /// Offer an element, applying the overflow policy when full
    pub fn offer(&mut self, element: T) -> Offer<T> {
        let element = match self.push(element) {
            Ok(()) => return Offer::Accepted,
            Err(element) => element,
        };

        // Zero capacity has nothing to evict and nowhere to put the element.
        let action = self.policy.on_overflow();
        if self.capacity == 0 {
            return match action {
                OverflowAction::FailStream | OverflowAction::Defer => Offer::Overflow(element),
                _ => Offer::Dropped(element),
            };
        }

        match action {
            OverflowAction::EvictHead => {
                let evicted = self.items.pop_front();
                self.items.push_back(element);
                Offer::Evicted(evicted.into_iter().collect())
            }
            OverflowAction::EvictTail => {
                let evicted = self.items.pop_back();
                self.items.push_back(element);
                Offer::Evicted(evicted.into_iter().collect())
            }
            OverflowAction::RefuseIncoming => Offer::Dropped(element),
            OverflowAction::EvictAll => {
                let evicted: Vec<T> = self.items.drain(..).collect();
                self.items.push_back(element);
                Offer::Evicted(evicted)
            }
            OverflowAction::FailStream | OverflowAction::Defer => Offer::Overflow(element),
        }
    }

    /// Remove and return the head element
    pub fn withdraw(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Discard every buffered element, returning how many were dropped
    pub fn discard(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    /// Whether another element fits without an overflow decision
    pub fn has_room(&self) -> bool {
        self.items.len() < self.capacity
    }

    /// Get the current size of the buffer
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
