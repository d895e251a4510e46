//! Inbound envelope decoding
//!
//! One broker delivery carries a base64-encoded JSON payload nested at
//! `message.data`. Some upstream publishers wrap their payload twice; the
//! decoder unwraps exactly one extra `{"data": <base64>}` layer and never
//! recurses further.

use crate::domain::event::TaskEvent;
use crate::FlowError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    message: EnvelopeMessage,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMessage {
    data: String,
}

/// Decode a transport envelope into an event
///
/// Fails with [`FlowError::DecodeError`] when the envelope lacks the nested
/// `message.data` field, when base64 decoding fails, when the payload is not
/// valid JSON, or when required event identifiers are missing.
pub fn decode_envelope(envelope: &Value) -> Result<TaskEvent, FlowError> {
    let envelope: Envelope = serde_json::from_value(envelope.clone())
        .map_err(|err| FlowError::DecodeError(format!("envelope missing message.data: {}", err)))?;

    let payload = decode_payload(&envelope.message.data)?;
    let payload = unwrap_double_encoding(payload)?;

    TaskEvent::from_value(payload)
}

fn decode_payload(data: &str) -> Result<Value, FlowError> {
    let bytes = base64::decode(data)
        .map_err(|err| FlowError::DecodeError(format!("invalid base64 payload: {}", err)))?;

    let text = String::from_utf8(bytes)
        .map_err(|err| FlowError::DecodeError(format!("payload is not UTF-8: {}", err)))?;

    serde_json::from_str(&text)
        .map_err(|err| FlowError::DecodeError(format!("payload is not valid JSON: {}", err)))
}

/// Unwrap one extra encoding layer when the payload is exactly
/// `{"data": <base64 string>}`
fn unwrap_double_encoding(payload: Value) -> Result<Value, FlowError> {
    let inner = match payload.as_object() {
        Some(object) if object.len() == 1 => match object.get("data") {
            Some(Value::String(inner)) => inner.clone(),
            _ => return Ok(payload),
        },
        _ => return Ok(payload),
    };

    decode_payload(&inner)
}
