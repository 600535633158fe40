//! Publishing Turbo Stream actions to channels.

use crate::client::Publisher;
use crate::error::{Result, StreamError};
use crate::subscriptions::STREAM_EVENT;
use crate::types::{StreamAction, StreamData};
use std::time::{SystemTime, UNIX_EPOCH};

use super::streamable::{channel_name, Streamable};
use super::tag::{turbo_stream_action_tag, turbo_stream_refresh_tag, turbo_stream_remove_tag};

/// Extra payload fields sent alongside the markup.
#[derive(Clone, Debug, Default)]
pub struct BroadcastOptions {
    /// Publisher-side label, `"{target}_{action}"` for action broadcasts.
    pub action: Option<String>,
    /// Seconds since the Unix epoch.
    pub timestamp: Option<f64>,
}

/// One stream action to broadcast.
#[derive(Clone, Debug, Default)]
pub struct ActionBroadcast {
    /// DOM id of the element to act on.
    pub target: Option<String>,
    /// CSS selector for several elements to act on.
    pub targets: Option<String>,
    /// Rendered markup placed inside `<template>`.
    pub template: Option<String>,
    /// Additional `<turbo-stream>` attributes.
    pub attributes: Vec<(String, String)>,
    /// Defaults to now.
    pub timestamp: Option<f64>,
}

impl ActionBroadcast {
    pub fn to_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn to_targets(selector: impl Into<String>) -> Self {
        Self {
            targets: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Publishes Turbo Stream markup through a backend [`Publisher`].
pub struct StreamBroadcaster<P> {
    publisher: P,
    event: String,
}

impl<P: Publisher> StreamBroadcaster<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            event: STREAM_EVENT.to_string(),
        }
    }

    /// Publish under a custom event type instead of `turbo_stream`.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Publish raw stream markup to the channel named by `stream`.
    pub fn broadcast_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        html: impl Into<String>,
        options: BroadcastOptions,
    ) -> Result<()> {
        let channel = channel_name(stream)?;
        let data = StreamData {
            html: Some(html.into()),
            action: options.action,
            timestamp: options.timestamp,
        };

        tracing::debug!(%channel, event = %self.event, "broadcasting stream");
        self.publisher
            .publish(&channel, &self.event, serde_json::to_value(data)?)
    }

    /// Publish a `<turbo-stream action=...>` built from `broadcast`.
    ///
    /// The timestamp is sent both as a tag attribute and in the payload.
    pub fn broadcast_action_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        action: StreamAction,
        broadcast: ActionBroadcast,
    ) -> Result<()> {
        let timestamp = broadcast.timestamp.unwrap_or_else(now_seconds);

        let mut attributes = broadcast.attributes;
        attributes.push(("timestamp".to_string(), timestamp.to_string()));

        let html = turbo_stream_action_tag(
            &action,
            broadcast.target.as_deref(),
            broadcast.targets.as_deref(),
            broadcast.template.as_deref(),
            &attributes,
        );
        let options = BroadcastOptions {
            action: Some(format!(
                "{}_{}",
                broadcast.target.as_deref().unwrap_or_default(),
                action
            )),
            timestamp: Some(timestamp),
        };

        self.broadcast_to(stream, html, options)
    }

    pub fn broadcast_append_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        target: &str,
        template: impl Into<String>,
    ) -> Result<()> {
        self.broadcast_action_to(
            stream,
            StreamAction::Append,
            ActionBroadcast::to_target(target).with_template(template),
        )
    }

    pub fn broadcast_prepend_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        target: &str,
        template: impl Into<String>,
    ) -> Result<()> {
        self.broadcast_action_to(
            stream,
            StreamAction::Prepend,
            ActionBroadcast::to_target(target).with_template(template),
        )
    }

    pub fn broadcast_replace_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        target: &str,
        template: impl Into<String>,
    ) -> Result<()> {
        self.broadcast_action_to(
            stream,
            StreamAction::Replace,
            ActionBroadcast::to_target(target).with_template(template),
        )
    }

    pub fn broadcast_update_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        target: &str,
        template: impl Into<String>,
    ) -> Result<()> {
        self.broadcast_action_to(
            stream,
            StreamAction::Update,
            ActionBroadcast::to_target(target).with_template(template),
        )
    }

    /// Insert the template before the target or each element matched by
    /// `targets`. One of the two is required.
    pub fn broadcast_before_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        broadcast: ActionBroadcast,
    ) -> Result<()> {
        self.broadcast_positioned_to(stream, StreamAction::Before, broadcast)
    }

    /// Insert the template after the target or each element matched by
    /// `targets`. One of the two is required.
    pub fn broadcast_after_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        broadcast: ActionBroadcast,
    ) -> Result<()> {
        self.broadcast_positioned_to(stream, StreamAction::After, broadcast)
    }

    fn broadcast_positioned_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        action: StreamAction,
        broadcast: ActionBroadcast,
    ) -> Result<()> {
        if broadcast.target.is_none() && broadcast.targets.is_none() {
            return Err(StreamError::InvalidMessage(format!(
                "{action} requires a target or targets"
            )));
        }
        self.broadcast_action_to(stream, action, broadcast)
    }

    /// Remove `target` from every subscribed page. Carries no options.
    pub fn broadcast_remove_to<S: Streamable + ?Sized>(&self, stream: &S, target: &str) -> Result<()> {
        self.broadcast_to(stream, turbo_stream_remove_tag(target), BroadcastOptions::default())
    }

    /// Ask every subscribed page to refresh itself.
    pub fn broadcast_refresh_to<S: Streamable + ?Sized>(
        &self,
        stream: &S,
        request_id: Option<&str>,
    ) -> Result<()> {
        self.broadcast_to(
            stream,
            turbo_stream_refresh_tag(request_id),
            BroadcastOptions {
                action: Some(StreamAction::Refresh.as_str().to_string()),
                timestamp: Some(now_seconds()),
            },
        )
    }
}
