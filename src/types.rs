//! Core types for stream delivery.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a display element interested in a channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

impl ElementId {
    /// Allocate a fresh, process-unique element identity.
    pub fn next() -> Self {
        ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend message identifier.
///
/// Identifiers are fixed-format, monotonically increasing strings, so plain
/// lexicographic comparison is chronological order. Never compare them as
/// numbers or timestamps.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

/// A message as delivered by the backend for the stream event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub id: MessageId,
    #[serde(default)]
    pub data: StreamData,
}

impl StreamMessage {
    /// Build a message carrying only an HTML fragment.
    pub fn html(id: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(id),
            data: StreamData {
                html: Some(html.into()),
                ..Default::default()
            },
        }
    }
}

/// Application payload of a stream message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    /// Turbo Stream markup to render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Publisher-side action label, e.g. `"messages_append"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Publish time in seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl StreamData {
    /// The renderable fragment, if any. Empty strings are not renderable.
    pub fn renderable(&self) -> Option<&str> {
        self.html.as_deref().filter(|html| !html.is_empty())
    }
}

/// Turbo Stream action named by a `<turbo-stream action="...">` tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamAction {
    Append,
    Prepend,
    Replace,
    Update,
    Remove,
    Before,
    After,
    Refresh,
    Other(String),
}

impl StreamAction {
    pub fn parse(s: &str) -> Self {
        match s {
            "append" => StreamAction::Append,
            "prepend" => StreamAction::Prepend,
            "replace" => StreamAction::Replace,
            "update" => StreamAction::Update,
            "remove" => StreamAction::Remove,
            "before" => StreamAction::Before,
            "after" => StreamAction::After,
            "refresh" => StreamAction::Refresh,
            other => StreamAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StreamAction::Append => "append",
            StreamAction::Prepend => "prepend",
            StreamAction::Replace => "replace",
            StreamAction::Update => "update",
            StreamAction::Remove => "remove",
            StreamAction::Before => "before",
            StreamAction::After => "after",
            StreamAction::Refresh => "refresh",
            StreamAction::Other(s) => s,
        }
    }

    /// Replace and update overwrite prior state; everything else adds to it.
    pub fn delivery_kind(&self) -> DeliveryKind {
        match self {
            StreamAction::Replace | StreamAction::Update => DeliveryKind::Destructive,
            _ => DeliveryKind::Additive,
        }
    }
}

impl fmt::Display for StreamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a message interacts with what is already on the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryKind {
    /// Overwrites prior state; stale or repeated deliveries must be dropped.
    Destructive,
    /// Inserts alongside prior state; always rendered.
    Additive,
}

const STREAM_TAG: &str = "<turbo-stream";

/// Actions declared by every `<turbo-stream>` opening tag in `html`.
pub fn stream_actions(html: &str) -> Vec<StreamAction> {
    let mut actions = Vec::new();
    let mut rest = html;

    while let Some(start) = rest.find(STREAM_TAG) {
        let after = &rest[start + STREAM_TAG.len()..];
        // Skip look-alikes such as <turbo-stream-source>.
        let is_tag = after
            .chars()
            .next()
            .map_or(false, |c| c.is_whitespace() || c == '>' || c == '/');
        if !is_tag {
            rest = after;
            continue;
        }

        let (attributes, end) = tag_attributes(after);
        if let Some((_, action)) = attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("action"))
        {
            actions.push(StreamAction::parse(action));
        }
        rest = &after[end..];
    }

    actions
}

/// Classify a fragment by the actions it declares.
pub fn classify(html: &str) -> DeliveryKind {
    if stream_actions(html)
        .iter()
        .any(|a| a.delivery_kind() == DeliveryKind::Destructive)
    {
        DeliveryKind::Destructive
    } else {
        DeliveryKind::Additive
    }
}

/// Attributes of the opening tag whose body starts at `body`, plus the
/// offset just past its closing `>`.
///
/// Quoted values are opaque: a `>` or an `action=` inside them neither ends
/// the tag nor counts as an attribute.
fn tag_attributes(body: &str) -> (Vec<(&str, &str)>, usize) {
    let bytes = body.as_bytes();
    let len = bytes.len();
    let mut attributes = Vec::new();
    let mut i = 0;

    let skip_space = |mut i: usize| {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    loop {
        while i < len && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= len {
            return (attributes, len);
        }
        if bytes[i] == b'>' {
            return (attributes, i + 1);
        }

        let name_start = i;
        while i < len
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = &body[name_start..i];

        i = skip_space(i);
        if i >= len || bytes[i] != b'=' {
            attributes.push((name, ""));
            continue;
        }
        i = skip_space(i + 1);

        match bytes.get(i) {
            Some(&quote @ (b'"' | b'\'')) => {
                let value_start = i + 1;
                let close = body[value_start..]
                    .find(quote as char)
                    .map_or(len, |p| value_start + p);
                attributes.push((name, &body[value_start..close]));
                i = (close + 1).min(len);
            }
            _ => {
                let value_start = i;
                while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                attributes.push((name, &body[value_start..i]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_orders_lexicographically() {
        assert!(MessageId::from("01H0") > MessageId::from("01G9"));
        // "9" sorts after "10" as strings; ids are fixed-width so this never bites.
        assert!(MessageId::from("9") > MessageId::from("10"));
    }

    #[test]
    fn test_classify_destructive_actions() {
        let replace = r#"<turbo-stream action="replace" target="msg_1"><template>x</template></turbo-stream>"#;
        let update = r#"<turbo-stream target="msg_1" action='update'><template>x</template></turbo-stream>"#;
        assert_eq!(classify(replace), DeliveryKind::Destructive);
        assert_eq!(classify(update), DeliveryKind::Destructive);
    }

    #[test]
    fn test_classify_additive_actions() {
        for action in ["append", "prepend", "remove", "before", "after", "refresh"] {
            let html = format!(r#"<turbo-stream action="{action}" target="t"></turbo-stream>"#);
            assert_eq!(classify(&html), DeliveryKind::Additive, "{action}");
        }
        assert_eq!(classify("<p>no stream here</p>"), DeliveryKind::Additive);
    }

    #[test]
    fn test_classify_ignores_lookalike_tags_and_attributes() {
        let html = r#"<turbo-stream-source action="replace"></turbo-stream-source>"#;
        assert_eq!(classify(html), DeliveryKind::Additive);

        let html = r#"<turbo-stream data-action="replace" action="append"></turbo-stream>"#;
        assert_eq!(stream_actions(html), vec![StreamAction::Append]);
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        let html = r##"<turbo-stream targets="#list > li" action="update"><template>x</template></turbo-stream>"##;
        assert_eq!(stream_actions(html), vec![StreamAction::Update]);
        assert_eq!(classify(html), DeliveryKind::Destructive);

        let html = r#"<turbo-stream target='a>b' action=replace><template>x</template></turbo-stream>"#;
        assert_eq!(classify(html), DeliveryKind::Destructive);
    }

    #[test]
    fn test_action_inside_other_value_is_ignored() {
        let html = r#"<turbo-stream target="x action=replace " action="append"></turbo-stream>"#;
        assert_eq!(stream_actions(html), vec![StreamAction::Append]);

        let html = r#"<turbo-stream target="x action=replace "></turbo-stream>"#;
        assert!(stream_actions(html).is_empty());
        assert_eq!(classify(html), DeliveryKind::Additive);
    }

    #[test]
    fn test_classify_any_destructive_tag_wins() {
        let html = concat!(
            r#"<turbo-stream action="append" target="a"></turbo-stream>"#,
            r#"<turbo-stream action="update" target="b"></turbo-stream>"#,
        );
        assert_eq!(
            stream_actions(html),
            vec![StreamAction::Append, StreamAction::Update]
        );
        assert_eq!(classify(html), DeliveryKind::Destructive);
    }

    #[test]
    fn test_message_deserializes_wire_shape() {
        let json = r#"{"id":"01A","data":{"html":"<turbo-stream action=\"append\">"}}"#;
        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, MessageId::from("01A"));
        assert!(msg.data.renderable().is_some());
        assert!(msg.data.timestamp.is_none());

        let empty: StreamMessage = serde_json::from_str(r#"{"id":"01B"}"#).unwrap();
        assert!(empty.data.renderable().is_none());
    }
}
