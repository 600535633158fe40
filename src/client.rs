//! Interfaces to the external messaging backend.
//!
//! The backend owns connections, token checks and delivery. This crate only
//! binds handlers to channels and publishes messages through these traits.

use crate::error::Result;
use crate::types::StreamMessage;
use std::fmt;
use std::sync::Arc;

/// Callback invoked for each message delivered on a bound channel.
pub type MessageHandler = Arc<dyn Fn(&StreamMessage) + Send + Sync>;

/// Supplies the subscribe token for a channel when the backend asks for it.
pub type TokenFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Options for a single channel binding.
#[derive(Clone)]
pub struct BindOptions {
    /// Channel to subscribe to.
    pub channel: String,
    /// Invoked lazily by the backend to authorize the subscription.
    pub subscribe_token_fn: TokenFn,
}

impl BindOptions {
    /// Options whose token supplier always returns `token`.
    pub fn with_token(channel: impl Into<String>, token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            channel: channel.into(),
            subscribe_token_fn: Arc::new(move || token.clone()),
        }
    }
}

impl fmt::Debug for BindOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindOptions")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// A live backend subscription.
pub trait Binding: Send {
    /// Release the subscription. Called at most once per binding.
    fn unbind(&mut self);
}

/// Client side of the backend: one logical connection, many bindings.
pub trait MessageClient: Send + Sync {
    /// Bind `handler` to `event` messages on `options.channel`.
    ///
    /// Implementations must not call back into the caller synchronously
    /// from `bind` or [`Binding::unbind`].
    fn bind(
        &self,
        event: &str,
        handler: MessageHandler,
        options: BindOptions,
    ) -> Result<Box<dyn Binding>>;
}

/// Server side of the backend: publish an event to a channel.
pub trait Publisher: Send + Sync {
    fn publish(&self, channel: &str, event: &str, data: serde_json::Value) -> Result<()>;
}

/// Issues backend tokens; signing lives in the backend library.
pub trait TokenIssuer: Send + Sync {
    /// Token allowing `uid` to subscribe to a single channel.
    fn subscribe_token(&self, channel: &str, uid: &str) -> Result<String>;

    /// Token allowing a page to open a connection as `uid`, with optional
    /// user metadata. See [`ConnectClaims`](crate::helpers::ConnectClaims).
    fn connect_token(&self, uid: &str, umd: Option<&serde_json::Value>) -> Result<String>;
}

impl<T: MessageClient + ?Sized> MessageClient for Arc<T> {
    fn bind(
        &self,
        event: &str,
        handler: MessageHandler,
        options: BindOptions,
    ) -> Result<Box<dyn Binding>> {
        (**self).bind(event, handler, options)
    }
}

impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    fn publish(&self, channel: &str, event: &str, data: serde_json::Value) -> Result<()> {
        (**self).publish(channel, event, data)
    }
}
