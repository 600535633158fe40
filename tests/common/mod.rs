//! Shared fixtures for integration tests.

#![allow(dead_code)]

use hotsock_turbo::{
    LocalBackend, ManualClock, Multiplexer, MultiplexerConfig, Renderer, Result, StreamError,
    SubscriptionRegistry,
};
use parking_lot::Mutex;
use std::sync::Arc;

pub const EVENT: &str = "turbo_stream";

pub fn append(body: &str) -> String {
    format!(r#"<turbo-stream action="append" target="messages"><template>{body}</template></turbo-stream>"#)
}

pub fn replace(body: &str) -> String {
    format!(r#"<turbo-stream action="replace" target="message_1"><template>{body}</template></turbo-stream>"#)
}

/// Renderer that records every fragment and can be told to fail on some.
#[derive(Default)]
pub struct RecordingRenderer {
    rendered: Mutex<Vec<String>>,
    fail_on: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail whenever a fragment contains `marker`.
    pub fn fail_on(&self, marker: &str) {
        self.fail_on.lock().push(marker.to_string());
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.rendered.lock().len()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, html: &str) -> Result<()> {
        if self.fail_on.lock().iter().any(|m| html.contains(m.as_str())) {
            return Err(StreamError::Render(format!("malformed fragment: {html}")));
        }
        self.rendered.lock().push(html.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub mux: Multiplexer,
    pub backend: LocalBackend,
    pub clock: Arc<ManualClock>,
    pub renderer: Arc<RecordingRenderer>,
    pub registry: Arc<SubscriptionRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        let backend = LocalBackend::new();
        let clock = Arc::new(ManualClock::new());
        let renderer = RecordingRenderer::new();
        let registry = Arc::new(SubscriptionRegistry::new());
        let mux = Multiplexer::new(
            Arc::clone(&registry),
            Arc::new(backend.clone()),
            Some(renderer.clone()),
            clock.clone(),
            MultiplexerConfig::default(),
        );

        Self {
            mux,
            backend,
            clock,
            renderer,
            registry,
        }
    }
}
