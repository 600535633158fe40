//! Server-side broadcasting of Turbo Stream actions.
//!
//! Builds `<turbo-stream>` markup and publishes it through the backend's
//! publish API so every page subscribed to the channel renders it.
//!
//! # Example
//!
//! ```ignore
//! let broadcaster = StreamBroadcaster::new(backend);
//!
//! broadcaster.broadcast_append_to("chat:1", "messages", "<li>Hello</li>")?;
//! broadcaster.broadcast_remove_to(&[room, "messages"], "message_7")?;
//! ```

mod broadcaster;
mod streamable;
mod tag;

pub use broadcaster::{ActionBroadcast, BroadcastOptions, StreamBroadcaster};
pub use streamable::{channel_name, Streamable};
pub use tag::{
    escape_html, turbo_stream_action_tag, turbo_stream_refresh_tag, turbo_stream_remove_tag,
};

pub(crate) use tag::push_attribute;
