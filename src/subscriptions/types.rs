//! Subscription types for channel multiplexing.

use std::time::Duration;

/// Event type Turbo Stream messages are published under.
pub const STREAM_EVENT: &str = "turbo_stream";

/// Default delay between the last release of a channel and its teardown.
pub const DEFAULT_UNSUBSCRIBE_DELAY: Duration = Duration::from_millis(250);

/// Configuration for a multiplexer.
#[derive(Clone, Debug)]
pub struct MultiplexerConfig {
    /// How long a channel stays bound after its last element releases it.
    /// Absorbs detach/re-attach churn during page navigation.
    /// Default: 250ms
    pub unsubscribe_delay: Duration,

    /// Backend event type to bind.
    /// Default: "turbo_stream"
    pub event: String,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            unsubscribe_delay: DEFAULT_UNSUBSCRIBE_DELAY,
            event: STREAM_EVENT.to_string(),
        }
    }
}

/// What `acquire` did for an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A new backend binding was opened for the channel.
    Created,
    /// The element joined an existing binding (cancelling any pending teardown).
    Joined,
    /// Channel or token missing; the element stays disconnected.
    Inert,
    /// No renderer is available in this host; the element stays disconnected.
    HostUnavailable,
    /// The backend refused the binding; the element stays disconnected.
    Failed,
}

impl AcquireOutcome {
    /// Whether the element was marked connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, AcquireOutcome::Created | AcquireOutcome::Joined)
    }
}

/// What the delivery filter did with one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Passed to the renderer successfully.
    Rendered,
    /// Stale or repeated destructive message; dropped.
    Discarded,
    /// Nothing renderable in the payload.
    Skipped,
    /// The renderer failed; logged and contained.
    Failed,
}
