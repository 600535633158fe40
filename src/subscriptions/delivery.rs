//! Per-channel delivery filtering.
//!
//! Backend delivery is at-least-once and not strictly ordered. Replace and
//! update messages overwrite page state, so a late or repeated one would
//! roll the page back; those are admitted only when their id is strictly
//! greater than the last one admitted on the channel. Additive messages
//! always pass: suppressing them would drop legitimate repeated inserts.

use crate::render::Renderer;
use crate::types::{classify, DeliveryKind, MessageId, StreamMessage};
use parking_lot::Mutex;
use std::sync::Arc;

use super::types::Delivery;

/// Highest admitted destructive message id for one channel binding.
///
/// Created with the binding and dropped with it, so it survives
/// zero-interest windows but never outlives a real teardown.
#[derive(Debug, Default)]
pub struct DeliveryCursor {
    last_seen: Mutex<Option<MessageId>>,
}

impl DeliveryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a message may be rendered, advancing the cursor for
    /// admitted destructive messages.
    pub fn admit(&self, id: &MessageId, kind: DeliveryKind) -> bool {
        if kind == DeliveryKind::Additive {
            return true;
        }

        let mut last_seen = self.last_seen.lock();
        if last_seen.as_ref().map_or(false, |last| id <= last) {
            return false;
        }
        *last_seen = Some(id.clone());
        true
    }

    pub fn last_seen(&self) -> Option<MessageId> {
        self.last_seen.lock().clone()
    }
}

/// Message handler installed on each channel binding.
pub(crate) struct DeliveryFilter {
    channel: String,
    cursor: Arc<DeliveryCursor>,
    renderer: Arc<dyn Renderer>,
}

impl DeliveryFilter {
    pub(crate) fn new(
        channel: impl Into<String>,
        cursor: Arc<DeliveryCursor>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            channel: channel.into(),
            cursor,
            renderer,
        }
    }

    pub(crate) fn handle(&self, message: &StreamMessage) -> Delivery {
        let Some(html) = message.data.renderable() else {
            return Delivery::Skipped;
        };

        let kind = classify(html);
        if !self.cursor.admit(&message.id, kind) {
            tracing::debug!(
                channel = %self.channel,
                id = %message.id,
                "discarding stale stream message"
            );
            return Delivery::Discarded;
        }

        match self.renderer.render(html) {
            Ok(()) => Delivery::Rendered,
            Err(err) => {
                tracing::error!(
                    channel = %self.channel,
                    id = %message.id,
                    %err,
                    "failed to render Turbo Stream message"
                );
                Delivery::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, StreamError};
    use proptest::prelude::*;

    const REPLACE: &str = r#"<turbo-stream action="replace" target="t"><template>x</template></turbo-stream>"#;
    const APPEND: &str = r#"<turbo-stream action="append" target="t"><template>x</template></turbo-stream>"#;

    fn recording_filter(channel: &str) -> (DeliveryFilter, Arc<Mutex<Vec<String>>>) {
        let rendered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&rendered);
        let renderer: Arc<dyn Renderer> = Arc::new(move |html: &str| -> Result<()> {
            sink.lock().push(html.to_string());
            Ok(())
        });
        let filter = DeliveryFilter::new(channel, Arc::new(DeliveryCursor::new()), renderer);
        (filter, rendered)
    }

    #[test]
    fn test_stale_destructive_message_discarded() {
        let (filter, rendered) = recording_filter("chat:1");

        assert_eq!(filter.handle(&StreamMessage::html("01H0", REPLACE)), Delivery::Rendered);
        assert_eq!(filter.handle(&StreamMessage::html("01G9", REPLACE)), Delivery::Discarded);
        assert_eq!(filter.handle(&StreamMessage::html("01H0", REPLACE)), Delivery::Discarded);

        assert_eq!(rendered.lock().len(), 1);
        assert_eq!(filter.cursor.last_seen(), Some(MessageId::from("01H0")));
    }

    #[test]
    fn test_additive_messages_always_render() {
        let (filter, rendered) = recording_filter("chat:1");

        assert_eq!(filter.handle(&StreamMessage::html("01H0", APPEND)), Delivery::Rendered);
        assert_eq!(filter.handle(&StreamMessage::html("01G9", APPEND)), Delivery::Rendered);
        assert_eq!(filter.handle(&StreamMessage::html("01G9", APPEND)), Delivery::Rendered);

        assert_eq!(rendered.lock().len(), 3);
        assert_eq!(filter.cursor.last_seen(), None);
    }

    #[test]
    fn test_additive_does_not_advance_cursor() {
        let (filter, rendered) = recording_filter("chat:1");

        filter.handle(&StreamMessage::html("01Z0", APPEND));
        assert_eq!(filter.handle(&StreamMessage::html("01A0", REPLACE)), Delivery::Rendered);
        assert_eq!(rendered.lock().len(), 2);
    }

    #[test]
    fn test_empty_payload_skipped() {
        let (filter, rendered) = recording_filter("chat:1");

        let mut message = StreamMessage::html("01A", "");
        assert_eq!(filter.handle(&message), Delivery::Skipped);
        message.data.html = None;
        assert_eq!(filter.handle(&message), Delivery::Skipped);
        assert!(rendered.lock().is_empty());
    }

    #[test]
    fn test_render_failure_contained() {
        let renderer: Arc<dyn Renderer> =
            Arc::new(|_: &str| -> Result<()> { Err(StreamError::Render("malformed".into())) });
        let filter = DeliveryFilter::new("chat:1", Arc::new(DeliveryCursor::new()), renderer);

        assert_eq!(filter.handle(&StreamMessage::html("01A", REPLACE)), Delivery::Failed);
        // The cursor still advanced: the failed message was admitted.
        assert_eq!(filter.handle(&StreamMessage::html("01A", REPLACE)), Delivery::Discarded);
    }

    #[test]
    fn test_fresh_cursor_admits_older_ids() {
        let kind = DeliveryKind::Destructive;
        let old = DeliveryCursor::new();
        assert!(old.admit(&MessageId::from("05"), kind));
        assert!(!old.admit(&MessageId::from("04"), kind));

        // A new binding starts from nothing, whatever the previous one saw.
        let fresh = DeliveryCursor::new();
        assert!(fresh.admit(&MessageId::from("04"), kind));
        assert_eq!(fresh.last_seen(), Some(MessageId::from("04")));
    }

    proptest! {
        #[test]
        fn prop_destructive_renders_only_new_maxima(ids in prop::collection::vec("[0-9A-Z]{4}", 1..40)) {
            let cursor = DeliveryCursor::new();
            let mut max: Option<String> = None;

            for id in &ids {
                let admitted = cursor.admit(&MessageId::new(id.clone()), DeliveryKind::Destructive);
                let expected = max.as_ref().map_or(true, |m| id > m);
                prop_assert_eq!(admitted, expected);
                if expected {
                    max = Some(id.clone());
                }
            }

            prop_assert_eq!(cursor.last_seen().map(|m| m.0), max);
        }
    }
}
