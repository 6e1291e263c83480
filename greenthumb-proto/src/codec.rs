//! JSON encode/decode for push-channel frames.

use serde_json::Value;

use crate::event::{Inbound, OutboundMessage, TaskEvent};

/// Error type for push-channel encode/decode operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The frame is not JSON at all.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    /// The frame is JSON but carries no string `type` field.
    #[error("message has no string `type` field")]
    MissingType,
    /// A known `type` whose payload does not have the expected shape.
    #[error("malformed `{kind}` message: {reason}")]
    InvalidShape {
        /// The `type` value of the rejected frame.
        kind: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Decodes one inbound frame.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`], [`CodecError::MissingType`], or
/// [`CodecError::InvalidShape`]. Unknown `type` values are not an error.
pub fn decode(bytes: &[u8]) -> Result<Inbound, CodecError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| CodecError::InvalidJson(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingType)?
        .to_string();

    if !TaskEvent::KINDS.contains(&kind.as_str()) {
        return Ok(Inbound::Unrecognized { kind });
    }

    serde_json::from_value(value)
        .map(Inbound::Task)
        .map_err(|e| CodecError::InvalidShape {
            kind,
            reason: e.to_string(),
        })
}

/// Decodes a text frame. See [`decode`].
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_str(text: &str) -> Result<Inbound, CodecError> {
    decode(text.as_bytes())
}

/// Encodes a client message as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if a payload value cannot be encoded.
pub fn encode(msg: &OutboundMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a task event the way the server pushes it.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the event cannot be encoded.
pub fn encode_event(event: &TaskEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Serialization(e.to_string()))
}
