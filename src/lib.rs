//! # Hotsock Turbo
//!
//! Turbo Streams delivered over a Hotsock-style channel backend instead of
//! Action Cable.
//!
//! ## Core Concepts
//!
//! - **Multiplexer**: one backend binding per channel, shared by every
//!   element that wants it, torn down after a short debounce
//! - **Delivery filter**: drops stale or repeated replace/update messages
//! - **Stream sources**: elements whose attach/detach drive subscriptions
//! - **Broadcasting**: `<turbo-stream>` markup published to channels
//!
//! ## Example
//!
//! ```ignore
//! use hotsock_turbo::{LocalBackend, Multiplexer, MultiplexerConfig, StreamBroadcaster,
//!     StreamSource, SubscriptionRegistry, TimerThread};
//!
//! let backend = LocalBackend::new();
//! let mux = Multiplexer::new(
//!     Arc::new(SubscriptionRegistry::new()),
//!     Arc::new(backend.clone()),
//!     Some(Arc::new(|html: &str| page.apply(html))),
//!     Arc::new(TimerThread::new()?),
//!     MultiplexerConfig::default(),
//! );
//!
//! let source = StreamSource::new(mux.clone(), "chat:1", token);
//! source.connect();
//!
//! StreamBroadcaster::new(backend).broadcast_append_to("chat:1", "messages", "<li>Hi</li>")?;
//! ```

pub mod broadcast;
pub mod client;
pub mod element;
pub mod error;
pub mod helpers;
pub mod local;
pub mod render;
pub mod scheduler;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use broadcast::{
    channel_name, ActionBroadcast, BroadcastOptions, StreamBroadcaster, Streamable,
};
pub use client::{BindOptions, Binding, MessageClient, MessageHandler, Publisher, TokenFn, TokenIssuer};
pub use element::{StreamElement, StreamSource};
pub use error::{Result, StreamError};
pub use helpers::{
    connect_token_response, meta_tags, stream_source_tag, ConnectClaims, HelperConfig,
};
pub use local::LocalBackend;
pub use render::Renderer;
pub use scheduler::{ManualClock, Scheduler, TaskHandle, TimerThread};
pub use subscriptions::{
    AcquireOutcome, Delivery, DeliveryCursor, Multiplexer, MultiplexerConfig,
    SubscriptionRegistry,
};
pub use types::*;
