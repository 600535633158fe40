//! Turbo Stream markup.

use crate::types::StreamAction;
use std::fmt::Write;

/// Escape text for use in HTML attribute values and content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Append ` name="value"` with the value escaped.
pub(crate) fn push_attribute(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, r#" {}="{}""#, name, escape_html(value));
}

/// Render a `<turbo-stream>` element.
///
/// `template` is inserted unescaped inside `<template>`; it is already
/// rendered markup.
pub fn turbo_stream_action_tag(
    action: &StreamAction,
    target: Option<&str>,
    targets: Option<&str>,
    template: Option<&str>,
    attributes: &[(String, String)],
) -> String {
    let mut tag = String::from("<turbo-stream");
    push_attribute(&mut tag, "action", action.as_str());
    if let Some(target) = target {
        push_attribute(&mut tag, "target", target);
    }
    if let Some(targets) = targets {
        push_attribute(&mut tag, "targets", targets);
    }
    for (name, value) in attributes {
        push_attribute(&mut tag, name, value);
    }
    let _ = write!(
        tag,
        "><template>{}</template></turbo-stream>",
        template.unwrap_or_default()
    );
    tag
}

/// Render a bare `remove` stream for `target`.
pub fn turbo_stream_remove_tag(target: &str) -> String {
    let mut tag = String::from("<turbo-stream");
    push_attribute(&mut tag, "action", StreamAction::Remove.as_str());
    push_attribute(&mut tag, "target", target);
    tag.push_str("></turbo-stream>");
    tag
}

/// Render a page `refresh` stream, tagged with the originating request.
pub fn turbo_stream_refresh_tag(request_id: Option<&str>) -> String {
    let mut tag = String::from("<turbo-stream");
    push_attribute(&mut tag, "action", StreamAction::Refresh.as_str());
    if let Some(request_id) = request_id {
        push_attribute(&mut tag, "request-id", request_id);
    }
    tag.push_str("></turbo-stream>");
    tag
}
