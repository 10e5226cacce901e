//! Master response envelope.
//!
//! Every master method answers with `[status_code, status_message, payload]`.
//! A status code of `1` means the call succeeded and `payload` holds the
//! method-specific data; `0` is a failure (the request was understood but could
//! not be satisfied) and `-1` an error (the request itself was bad).

use serde_json::{json, Value};

use crate::protocol::error::{Result, RvError};

/// Envelope status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i64);

impl StatusCode {
    pub const ERROR: StatusCode = StatusCode(-1);
    pub const FAILURE: StatusCode = StatusCode(0);
    pub const SUCCESS: StatusCode = StatusCode(1);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub code: StatusCode,
    pub message: String,
    pub payload: Value,
}

impl Envelope {
    pub fn new(code: StatusCode, message: impl Into<String>, payload: Value) -> Self {
        Self {
            code,
            message: message.into(),
            payload,
        }
    }

    pub fn success(message: impl Into<String>, payload: Value) -> Self {
        Self::new(StatusCode::SUCCESS, message, payload)
    }

    /// A failure envelope. The payload slot is still present on the wire.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FAILURE, message, Value::from(0))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ERROR, message, Value::from(0))
    }

    /// Parses the shape `[int, string, any]`.
    ///
    /// This only checks structure; a well-formed envelope with a non-success
    /// code parses fine.
    pub fn parse(value: &Value) -> Result<Self> {
        let parts = value
            .as_array()
            .ok_or_else(|| RvError::InvalidResponse(format!("envelope is not an array: {}", value)))?;

        if parts.len() != 3 {
            return Err(RvError::InvalidResponse(format!(
                "envelope must have 3 elements, got {}",
                parts.len()
            )));
        }

        let code = parts[0]
            .as_i64()
            .ok_or_else(|| RvError::InvalidResponse(format!("status code is not an integer: {}", parts[0])))?;
        let message = parts[1]
            .as_str()
            .ok_or_else(|| RvError::InvalidResponse(format!("status message is not a string: {}", parts[1])))?;

        Ok(Self::new(StatusCode(code), message, parts[2].clone()))
    }

    pub fn into_value(self) -> Value {
        json!([self.code.0, self.message, self.payload])
    }
}
