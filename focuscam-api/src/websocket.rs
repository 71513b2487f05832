// WebSocket message protocol for the camera relay

use crate::payload::{decode_payload, encode_payload, PayloadError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Text message that cannot be interpreted at all
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,
}

/// Encoded image carried by an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// `data` field of a JSON `frame` message (base64 or data URL)
    Base64(String),
    /// Raw encoded image sent as a binary WebSocket message
    Binary(Vec<u8>),
}

impl FramePayload {
    /// Size of the payload as received on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            FramePayload::Base64(data) => data.len(),
            FramePayload::Binary(bytes) => bytes.len(),
        }
    }

    /// Encoded image bytes, ready for the codec
    pub fn into_bytes(self) -> Result<Vec<u8>, PayloadError> {
        match self {
            FramePayload::Base64(data) => decode_payload(&data),
            FramePayload::Binary(bytes) if bytes.is_empty() => Err(PayloadError::Empty),
            FramePayload::Binary(bytes) => Ok(bytes),
        }
    }
}

/// Client -> Server messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Start,
    Frame { payload: FramePayload },
    /// Any other `type`, or none at all. Always ignored by the session.
    Unknown { kind: Option<String> },
}

impl InboundMessage {
    /// Parse a text message.
    ///
    /// Only malformed JSON or a non-object is an error; an object with a
    /// missing or unrecognised `type` becomes `Unknown`.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: JsonValue = serde_json::from_str(text)?;
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;

        let kind = object.get("type").and_then(JsonValue::as_str);
        let message = match kind {
            Some("start") => InboundMessage::Start,
            Some("frame") => {
                // A missing `data` field fails later, at decode time.
                let data = object
                    .get("data")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                InboundMessage::Frame {
                    payload: FramePayload::Base64(data),
                }
            }
            other => InboundMessage::Unknown {
                kind: other.map(str::to_string),
            },
        };
        Ok(message)
    }

    /// Wrap a binary WebSocket message as a frame
    pub fn binary_frame(bytes: Vec<u8>) -> Self {
        InboundMessage::Frame {
            payload: FramePayload::Binary(bytes),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::Start => "start",
            InboundMessage::Frame { .. } => "frame",
            InboundMessage::Unknown { kind } => kind.as_deref().unwrap_or("<none>"),
        }
    }
}

/// Server -> Client messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "frame")]
    Frame { image: String },
    #[serde(rename = "error")]
    Error { message: String },
}

impl OutboundMessage {
    /// Frame reply carrying an encoded image
    pub fn frame(encoded: &[u8]) -> Self {
        OutboundMessage::Frame {
            image: encode_payload(encoded),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            message: message.into(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
