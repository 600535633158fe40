//! In-process loopback backend.
//!
//! `LocalBackend` plays both sides of the messaging backend: elements bind
//! to it through [`MessageClient`] and broadcasters publish to it through
//! [`Publisher`]. Messages are delivered synchronously on the publishing
//! thread. Useful for single-process hosts, demos and tests.

use crate::client::{BindOptions, Binding, MessageClient, MessageHandler, Publisher};
use crate::error::{Result, StreamError};
use crate::types::{MessageId, StreamData, StreamMessage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use ulid::Generator;

struct BoundHandler {
    event: String,
    channel: String,
    handler: MessageHandler,
}

struct LocalState {
    bindings: HashMap<u64, BoundHandler>,
    next_binding: u64,
    bind_count: usize,
    unbind_count: usize,
    tokens: HashMap<String, Vec<String>>,
    /// Monotonic even within one millisecond or if the wall clock steps back.
    ids: Generator,
}

impl Default for LocalState {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
            next_binding: 0,
            bind_count: 0,
            unbind_count: 0,
            tokens: HashMap::new(),
            ids: Generator::new(),
        }
    }
}

impl LocalState {
    fn next_id(&mut self) -> Result<MessageId> {
        let ulid = self
            .ids
            .generate()
            .map_err(|e| StreamError::Publish(format!("message id space exhausted: {e}")))?;
        Ok(MessageId(ulid.to_string()))
    }
}

#[derive(Default)]
struct LocalInner {
    state: Mutex<LocalState>,
    closed: AtomicBool,
}

/// Loopback messaging backend.
#[derive(Clone, Default)]
pub struct LocalBackend {
    inner: Arc<LocalInner>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse further binds and publishes.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Publish `data` on `channel`, returning the id assigned to it.
    pub fn publish_message(
        &self,
        channel: &str,
        event: &str,
        data: StreamData,
    ) -> Result<MessageId> {
        if self.is_closed() {
            return Err(StreamError::Closed);
        }

        let id = self.inner.state.lock().next_id()?;
        let message = StreamMessage {
            id: id.clone(),
            data,
        };
        self.inject(channel, event, &message);
        Ok(id)
    }

    /// Deliver `message` as-is to every handler bound to `event` on
    /// `channel`, returning how many handlers received it.
    ///
    /// Ids are not checked, so redelivery and reordering can be simulated.
    pub fn inject(&self, channel: &str, event: &str, message: &StreamMessage) -> usize {
        let handlers: Vec<MessageHandler> = {
            let state = self.inner.state.lock();
            state
                .bindings
                .values()
                .filter(|b| b.channel == channel && b.event == event)
                .map(|b| Arc::clone(&b.handler))
                .collect()
        };

        for handler in &handlers {
            handler(message);
        }
        handlers.len()
    }

    /// Total bindings ever opened.
    pub fn bind_count(&self) -> usize {
        self.inner.state.lock().bind_count
    }

    /// Total `unbind` calls received, including repeated ones.
    pub fn unbind_count(&self) -> usize {
        self.inner.state.lock().unbind_count
    }

    /// Bindings currently open on `channel`.
    pub fn active_bindings(&self, channel: &str) -> usize {
        self.inner
            .state
            .lock()
            .bindings
            .values()
            .filter(|b| b.channel == channel)
            .count()
    }

    /// Subscribe tokens presented for `channel`, in bind order.
    pub fn tokens(&self, channel: &str) -> Vec<String> {
        self.inner
            .state
            .lock()
            .tokens
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }
}

impl MessageClient for LocalBackend {
    fn bind(
        &self,
        event: &str,
        handler: MessageHandler,
        options: BindOptions,
    ) -> Result<Box<dyn Binding>> {
        if self.is_closed() {
            return Err(StreamError::Bind(format!(
                "backend closed; cannot bind {}",
                options.channel
            )));
        }

        let token = (options.subscribe_token_fn)();
        if token.is_empty() {
            return Err(StreamError::Bind(format!(
                "empty subscribe token for {}",
                options.channel
            )));
        }

        let mut state = self.inner.state.lock();
        let id = state.next_binding;
        state.next_binding += 1;
        state.bind_count += 1;
        state
            .tokens
            .entry(options.channel.clone())
            .or_default()
            .push(token);
        state.bindings.insert(
            id,
            BoundHandler {
                event: event.to_string(),
                channel: options.channel,
                handler,
            },
        );

        Ok(Box::new(LocalBinding {
            id,
            backend: Arc::downgrade(&self.inner),
        }))
    }
}

impl Publisher for LocalBackend {
    fn publish(&self, channel: &str, event: &str, data: serde_json::Value) -> Result<()> {
        let data: StreamData = serde_json::from_value(data)?;
        self.publish_message(channel, event, data).map(|_| ())
    }
}

struct LocalBinding {
    id: u64,
    backend: Weak<LocalInner>,
}

impl Binding for LocalBinding {
    fn unbind(&mut self) {
        if let Some(inner) = self.backend.upgrade() {
            let mut state = inner.state.lock();
            state.unbind_count += 1;
            state.bindings.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_handler() -> (MessageHandler, Arc<Mutex<Vec<StreamMessage>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: MessageHandler = Arc::new(move |m: &StreamMessage| sink.lock().push(m.clone()));
        (handler, seen)
    }

    #[test]
    fn test_ids_are_increasing_ulids() {
        let mut state = LocalState::default();
        let mut prev = state.next_id().unwrap();

        for _ in 0..1000 {
            let id = state.next_id().unwrap();
            assert_eq!(id.as_str().len(), 26);
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    fn test_published_ids_parse_as_ulid() {
        let backend = LocalBackend::new();
        let id = backend
            .publish_message("chat:1", "turbo_stream", StreamData::default())
            .unwrap();

        let parsed = ulid::Ulid::from_string(id.as_str()).unwrap();
        assert_eq!(parsed.to_string(), id.0);
    }

    #[test]
    fn test_publish_reaches_matching_bindings_only() {
        let backend = LocalBackend::new();
        let (chat, chat_seen) = recording_handler();
        let (other, other_seen) = recording_handler();

        let _a = backend
            .bind("turbo_stream", chat, BindOptions::with_token("chat:1", "tok"))
            .unwrap();
        let _b = backend
            .bind("turbo_stream", other, BindOptions::with_token("chat:2", "tok"))
            .unwrap();

        let data = StreamData {
            html: Some("<p>hi</p>".into()),
            ..Default::default()
        };
        let id = backend.publish_message("chat:1", "turbo_stream", data).unwrap();

        let seen = chat_seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, id);
        assert!(other_seen.lock().is_empty());
        assert_eq!(backend.tokens("chat:1"), vec!["tok".to_string()]);
    }

    #[test]
    fn test_unbind_stops_delivery() {
        let backend = LocalBackend::new();
        let (handler, seen) = recording_handler();

        let mut binding = backend
            .bind("turbo_stream", handler, BindOptions::with_token("chat:1", "tok"))
            .unwrap();
        assert_eq!(backend.active_bindings("chat:1"), 1);

        binding.unbind();
        assert_eq!(backend.active_bindings("chat:1"), 0);
        assert_eq!(backend.unbind_count(), 1);

        let delivered = backend.inject("chat:1", "turbo_stream", &StreamMessage::html("01A", "x"));
        assert_eq!(delivered, 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_closed_backend_refuses() {
        let backend = LocalBackend::new();
        backend.close();

        let (handler, _) = recording_handler();
        let result = backend.bind("turbo_stream", handler, BindOptions::with_token("c", "t"));
        assert!(matches!(result, Err(StreamError::Bind(_))));

        let result = backend.publish_message("c", "turbo_stream", StreamData::default());
        assert!(matches!(result, Err(StreamError::Closed)));
    }

    #[test]
    fn test_publish_rejects_malformed_data() {
        let backend = LocalBackend::new();
        let result = backend.publish("c", "turbo_stream", serde_json::json!({"html": 42}));
        assert!(matches!(result, Err(StreamError::Deserialization(_))));
    }
}
