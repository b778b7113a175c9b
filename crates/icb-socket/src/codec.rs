//! Text frames exchanged with the chat server.
//!
//! Events travel as `42[<name>,<payload>]`; a bare `2` is the keep-alive.
//! Anything else the server sends (handshake, pong, other events) decodes to
//! [`InboundEvent::Unrecognized`].

use std::borrow::Cow;

use serde_json::{json, Value};

use icb_core::{domain::ChatMessage, messaging::types::InboundEvent, Error, Result};

pub const KEEP_ALIVE_FRAME: &str = "2";

const EVENT_PREFIX: &str = "42";
const EVENT_NEW_MESSAGE: &str = "new-message";
const EVENT_JOIN_CHANNEL: &str = "join-channel";
const REDACTED: &str = "<redacted>";

pub fn encode_join(mountpoint: &str, auth_token: &str) -> String {
    encode_event(
        EVENT_JOIN_CHANNEL,
        json!({ "mountpoint": mountpoint, "auth_token": auth_token }),
    )
}

pub fn encode_text(text: &str) -> String {
    encode_event(EVENT_NEW_MESSAGE, json!({ "text": text }))
}

fn encode_event(name: &str, payload: Value) -> String {
    format!("{EVENT_PREFIX}{}", json!([name, payload]))
}

/// Frame text fit for the log. The join frame's auth token is masked; every
/// other frame is returned as is.
pub fn loggable(frame: &str) -> Cow<'_, str> {
    let Some(body) = frame.strip_prefix(EVENT_PREFIX) else {
        return Cow::Borrowed(frame);
    };
    if !body.starts_with(&format!("[\"{EVENT_JOIN_CHANNEL}\"")) {
        return Cow::Borrowed(frame);
    }
    let Ok(mut parts) = serde_json::from_str::<Vec<Value>>(body) else {
        return Cow::Borrowed(REDACTED);
    };
    if let Some(token) = parts.get_mut(1).and_then(|p| p.get_mut("auth_token")) {
        *token = Value::String(REDACTED.to_string());
    }
    Cow::Owned(format!("{EVENT_PREFIX}{}", Value::Array(parts)))
}

/// Decode one inbound text frame.
///
/// Errors only for `new-message` frames whose payload does not parse; the
/// caller logs and drops those.
pub fn decode(frame: &str) -> Result<InboundEvent> {
    let Some(body) = frame.strip_prefix(EVENT_PREFIX) else {
        return Ok(InboundEvent::Unrecognized);
    };
    if !body.starts_with('[') {
        return Ok(InboundEvent::Unrecognized);
    }

    let mut parts: Vec<Value> = serde_json::from_str(body)?;
    if parts.first().and_then(Value::as_str) != Some(EVENT_NEW_MESSAGE) {
        return Ok(InboundEvent::Unrecognized);
    }

    let payload = parts
        .get_mut(1)
        .map(Value::take)
        .ok_or_else(|| Error::External("new-message frame without payload".to_string()))?;
    let msg: ChatMessage = serde_json::from_value(payload)?;
    Ok(InboundEvent::ChatMessage(msg))
}
