//! Stream source elements.
//!
//! A stream source is the display element that asks for a channel when it
//! is attached to the document and gives it up when detached. Its
//! `connected` flag mirrors whether it currently holds a subscription.

use crate::subscriptions::{AcquireOutcome, Multiplexer};
use crate::types::ElementId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// An element whose attach/detach drives channel interest.
pub trait StreamElement {
    fn id(&self) -> ElementId;

    /// Called once the element holds a subscription.
    fn subscription_connected(&self) {}

    /// Called whenever the element gives its subscription up.
    fn subscription_disconnected(&self) {}
}

/// A bare identity with no observable state.
impl StreamElement for ElementId {
    fn id(&self) -> ElementId {
        *self
    }
}

type StatusObserver = Box<dyn Fn(ElementId, bool) + Send + Sync>;

/// A `<hotsock-turbo-stream-source>` element.
pub struct StreamSource {
    id: ElementId,
    mux: Multiplexer,
    /// `data-channel`; empty when absent.
    channel: String,
    /// `data-token`; empty when absent.
    token: String,
    /// Channel this element last asked for, until it detaches.
    current: Mutex<Option<String>>,
    connected: AtomicBool,
    observer: Option<StatusObserver>,
}

impl StreamSource {
    pub fn new(mux: Multiplexer, channel: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: ElementId::next(),
            mux,
            channel: channel.into(),
            token: token.into(),
            current: Mutex::new(None),
            connected: AtomicBool::new(false),
            observer: None,
        }
    }

    /// Report connection status changes to `observer`, e.g. to toggle a
    /// `connected` attribute.
    pub fn with_observer(mut self, observer: impl Fn(ElementId, bool) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The element was attached to the document.
    pub fn connect(&self) -> AcquireOutcome {
        if self.channel.is_empty() || self.token.is_empty() {
            return AcquireOutcome::Inert;
        }

        *self.current.lock() = Some(self.channel.clone());
        self.mux.acquire(&self.channel, &self.token, self)
    }

    /// The element was detached from the document.
    pub fn disconnect(&self) {
        let Some(channel) = self.current.lock().take() else {
            return;
        };
        self.mux.release(&channel, self);
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        if let Some(observer) = &self.observer {
            observer(self.id, connected);
        }
    }
}

impl StreamElement for StreamSource {
    fn id(&self) -> ElementId {
        self.id
    }

    fn subscription_connected(&self) {
        self.set_connected(true);
    }

    fn subscription_disconnected(&self) {
        self.set_connected(false);
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}
