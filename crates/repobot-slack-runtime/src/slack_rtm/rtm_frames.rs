//! Decoding of inbound RTM websocket frames and encoding of outbound ones.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RtmFrame {
    Hello,
    Message {
        channel_id: String,
        user_id: Option<String>,
        text: String,
        ts: Option<String>,
        subtype: Option<String>,
    },
    PresenceChange {
        user: String,
        presence: String,
    },
    Pong {
        reply_to: u64,
    },
    Error {
        code: Option<i64>,
        message: String,
    },
    Goodbye,
    /// Acknowledgement of a frame this client sent.
    Reply {
        reply_to: u64,
        ok: bool,
    },
    Other {
        kind: String,
        payload: Value,
    },
}

#[derive(Debug, Deserialize)]
struct RtmMessagePayload {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RtmPresencePayload {
    #[serde(default)]
    user: String,
    #[serde(default)]
    presence: String,
}

#[derive(Debug, Default, Deserialize)]
struct RtmErrorDetail {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

pub(crate) fn parse_rtm_frame(text: &str) -> Result<RtmFrame> {
    let payload =
        serde_json::from_str::<Value>(text).context("failed to parse slack rtm frame")?;

    let Some(kind) = payload.get("type").and_then(Value::as_str) else {
        if let Some(reply_to) = payload.get("reply_to").and_then(Value::as_u64) {
            let ok = payload.get("ok").and_then(Value::as_bool).unwrap_or(false);
            return Ok(RtmFrame::Reply { reply_to, ok });
        }
        return Ok(RtmFrame::Other {
            kind: "unknown".to_string(),
            payload,
        });
    };

    let frame = match kind {
        "hello" => RtmFrame::Hello,
        "goodbye" => RtmFrame::Goodbye,
        "message" => {
            let message = serde_json::from_value::<RtmMessagePayload>(payload.clone())
                .context("failed to decode slack rtm message frame")?;
            match message.channel.filter(|channel| !channel.trim().is_empty()) {
                Some(channel_id) => RtmFrame::Message {
                    channel_id,
                    user_id: message.user,
                    text: message.text.unwrap_or_default(),
                    ts: message.ts,
                    subtype: message.subtype,
                },
                None => RtmFrame::Other {
                    kind: kind.to_string(),
                    payload,
                },
            }
        }
        "presence_change" => {
            let presence = serde_json::from_value::<RtmPresencePayload>(payload)
                .context("failed to decode slack rtm presence_change frame")?;
            RtmFrame::PresenceChange {
                user: presence.user,
                presence: presence.presence,
            }
        }
        "pong" => match payload.get("reply_to").and_then(Value::as_u64) {
            Some(reply_to) => RtmFrame::Pong { reply_to },
            None => RtmFrame::Other {
                kind: kind.to_string(),
                payload,
            },
        },
        "error" => {
            let detail = payload
                .get("error")
                .cloned()
                .map(serde_json::from_value::<RtmErrorDetail>)
                .transpose()
                .context("failed to decode slack rtm error frame")?
                .unwrap_or_default();
            RtmFrame::Error {
                code: detail.code,
                message: detail
                    .msg
                    .unwrap_or_else(|| "unspecified rtm error".to_string()),
            }
        }
        other => RtmFrame::Other {
            kind: other.to_string(),
            payload,
        },
    };
    Ok(frame)
}

pub(crate) fn render_outgoing_message_frame(id: u64, channel_id: &str, text: &str) -> String {
    json!({
        "id": id,
        "type": "message",
        "channel": channel_id,
        "text": text,
    })
    .to_string()
}

pub(crate) fn render_ping_frame(id: u64) -> String {
    json!({ "id": id, "type": "ping" }).to_string()
}
