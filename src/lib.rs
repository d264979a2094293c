//! Bridges a push-based, externally addressable producer with a pull-driven
//! stream consumer.
//!
//! Producers hold a cloneable [`Endpoint`] and send values to it like a
//! mailbox. Values are buffered under a bounded capacity and an
//! [`OverflowPolicy`]; under the backpressure policy every send is gated by
//! credit and answered with an acknowledgement. A single [`StreamPump`]
//! withdraws elements on demand and delivers them, in acceptance order, to a
//! [`Sink`]. Completion and failure signals end the stream: completion drains
//! what is buffered first, failure discards it.
//!
//! # Features
//!
//! - Six overflow policies: drop-oldest, drop-newest, drop-new, clear-all,
//!   fail and backpressure
//! - Per-send acknowledgements with FIFO admission of suspended producers
//! - Predicate or tagged-message completion and failure signals
//! - Consumer cancellation that releases every suspended producer
//! - Per-stream metrics: accepted, dropped, delivered, acknowledgement waits
//!
//! # Example
//!
//! ```ignore
//! use mailbox_source::{OverflowPolicy, SourceBuilder};
//!
//! let (endpoint, mut pump) = SourceBuilder::new()
//!     .capacity(100)
//!     .overflow_policy(OverflowPolicy::DropOldest)
//!     .completion_predicate(|msg: &&str| *msg == "complete")
//!     .build(Vec::new())?;
//!
//! endpoint.send("hello")?;
//! endpoint.send("complete")?;
//!
//! pump.run();
//! assert_eq!(pump.sink(), &vec!["hello"]);
//! ```

pub mod backpressure;
pub mod buffer;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod pump;
mod shared;
pub mod signal;
pub mod source;
pub mod state;

// Re-exports for convenience
pub use backpressure::{Ack, BackpressureController, Permit};
pub use buffer::{Buffer, Offer, OverflowAction, OverflowPolicy};
pub use config::SourceConfig;
pub use endpoint::{Endpoint, Sent};
pub use error::{FailureCause, Result, SendError, SourceError};
pub use metrics::{MetricsSnapshot, SourceMetrics};
pub use pump::{CancelHandle, PumpStatus, Sink, SinkEvent, StreamPump};
pub use signal::{CompletionStrategy, Message, Signal, SignalMatcher};
pub use source::{materialize, SourceBuilder};
pub use state::StreamState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
