use rvmaster_common::protocol::Envelope;
use serde_json::Value;

/// Checks a raw master response and extracts its payload.
pub trait ResponseValidator: Send + Sync {
    /// Returns the payload of `response`, or why it is unusable.
    fn validate(&self, method: &str, response: &Value) -> Result<Value, String>;
}

/// Validates the standard `[code, message, payload]` envelope.
///
/// Only a well-formed envelope with status code `1` yields its payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeValidator;

impl ResponseValidator for EnvelopeValidator {
    fn validate(&self, method: &str, response: &Value) -> Result<Value, String> {
        let envelope = Envelope::parse(response).map_err(|e| e.to_string())?;

        if !envelope.code.is_success() {
            tracing::debug!(
                method,
                code = %envelope.code,
                message = %envelope.message,
                "master call returned an error status"
            );
            return Err(format!("status {}: {}", envelope.code, envelope.message));
        }

        Ok(envelope.payload)
    }
}
