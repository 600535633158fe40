//! Page markup for wiring a document to the backend.

use crate::broadcast::{channel_name, push_attribute, Streamable};
use crate::client::TokenIssuer;
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;

/// Tag name of the stream source element.
pub const STREAM_SOURCE_TAG: &str = "hotsock-turbo-stream-source";

/// Connection settings exposed to the page through meta tags.
#[derive(Clone, Debug, Default)]
pub struct HelperConfig {
    /// Endpoint the page POSTs to for a connect token.
    pub connect_token_path: Option<String>,
    /// Backend WebSocket URL.
    pub wss_url: Option<String>,
    /// Client-side log level.
    pub log_level: Option<String>,
}

impl HelperConfig {
    /// Fields set in `overrides` win over `self`.
    pub fn merged(&self, overrides: &HelperConfig) -> HelperConfig {
        HelperConfig {
            connect_token_path: overrides
                .connect_token_path
                .clone()
                .or_else(|| self.connect_token_path.clone()),
            wss_url: overrides.wss_url.clone().or_else(|| self.wss_url.clone()),
            log_level: overrides.log_level.clone().or_else(|| self.log_level.clone()),
        }
    }
}

fn meta_tag(name: &str, content: Option<&str>) -> String {
    let mut tag = String::from("<meta");
    push_attribute(&mut tag, "name", name);
    if let Some(content) = content {
        push_attribute(&mut tag, "content", content);
    }
    tag.push_str(" />");
    tag
}

/// Render the `hotsock:*` meta tags, one per line.
pub fn meta_tags(config: &HelperConfig, overrides: &HelperConfig) -> String {
    let config = config.merged(overrides);
    [
        meta_tag("hotsock:connect-token-path", config.connect_token_path.as_deref()),
        meta_tag("hotsock:log-level", config.log_level.as_deref()),
        meta_tag("hotsock:wss-url", config.wss_url.as_deref()),
    ]
    .join("\n")
}

/// Render a stream source element subscribed to the channel named by
/// `streamables`, carrying a freshly issued subscribe token.
pub fn stream_source_tag<S: Streamable + ?Sized>(
    streamables: &S,
    issuer: &dyn TokenIssuer,
    uid: &str,
    attributes: &[(&str, &str)],
) -> Result<String> {
    let channel = channel_name(streamables)?;
    let token = issuer.subscribe_token(&channel, uid)?;

    let mut tag = format!("<{STREAM_SOURCE_TAG}");
    for (name, value) in attributes {
        push_attribute(&mut tag, name, value);
    }
    push_attribute(&mut tag, "data-token", &token);
    push_attribute(&mut tag, "data-channel", &channel);
    push_attribute(&mut tag, "data-user-id", uid);
    tag.push_str(&format!("></{STREAM_SOURCE_TAG}>"));

    Ok(tag)
}

/// Claims of a connect token, as handed to the signer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectClaims {
    pub scope: &'static str,
    #[serde(rename = "keepAlive")]
    pub keep_alive: bool,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umd: Option<Value>,
}

impl ConnectClaims {
    /// Keep-alive connect claims for `uid`. A null `umd` is left out.
    pub fn new(uid: &str, umd: Option<&Value>) -> Self {
        Self {
            scope: "connect",
            keep_alive: true,
            uid: uid.to_string(),
            umd: umd.filter(|v| !v.is_null()).cloned(),
        }
    }
}

#[derive(Serialize)]
struct ConnectTokenResponse {
    token: String,
}

/// JSON body served at the connect token path: `{"token":".."}`.
pub fn connect_token_response(
    issuer: &dyn TokenIssuer,
    uid: &str,
    umd: Option<&Value>,
) -> Result<String> {
    let token = issuer.connect_token(uid, umd)?;
    Ok(serde_json::to_string(&ConnectTokenResponse { token })?)
}
