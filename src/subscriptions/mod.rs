//! Channel subscription multiplexing.
//!
//! Any number of stream source elements may want the same channel. The
//! multiplexer keeps exactly one backend binding per channel:
//! - Reference counting by element identity
//! - Debounced teardown when the last element goes away
//! - Duplicate and out-of-order suppression for replace/update messages
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(SubscriptionRegistry::new());
//! let mux = Multiplexer::new(
//!     Arc::clone(&registry),
//!     Arc::new(backend),
//!     Some(renderer),
//!     Arc::new(TimerThread::new()?),
//!     MultiplexerConfig::default(),
//! );
//!
//! let element = ElementId::next();
//! mux.acquire("chat:1", &token, &element);
//! // ... later, on detach
//! mux.release("chat:1", &element);
//!
//! // At host shutdown
//! registry.shutdown();
//! ```

mod delivery;
mod manager;
mod types;

pub use delivery::DeliveryCursor;
pub use manager::{Multiplexer, SubscriptionRegistry};
pub use types::{
    AcquireOutcome, Delivery, MultiplexerConfig, DEFAULT_UNSUBSCRIBE_DELAY, STREAM_EVENT,
};
