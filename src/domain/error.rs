//! Errors raised while decoding bus payloads

use thiserror::Error;

/// A bus message that cannot be acted on; the message is dropped, never retried
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing or empty field `{0}`")]
    MissingField(&'static str),
    #[error("unknown {kind} value `{value}`")]
    UnknownValue { kind: &'static str, value: String },
}
