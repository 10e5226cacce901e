//! RVMaster Response Types
//!
//! This module defines the raw response returned for every request.

use serde::{Deserialize, Serialize};
use super::RequestId;

/// A raw response from the master.
///
/// `result` carries the envelope exactly as the master sent it. The transport
/// never interprets it; checking the status code and extracting the payload is
/// the job of the caller (see [`Envelope`](super::Envelope)).
///
/// # Example
///
/// ```
/// use rvmaster_common::protocol::{Envelope, Response};
/// use serde_json::json;
///
/// let response = Response::new(7, Envelope::success("ok", json!([])).into_value());
/// assert_eq!(response.result, json!([1, "ok", []]));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Request identifier this response corresponds to
    pub id: RequestId,
    /// The master's envelope, uninterpreted
    pub result: serde_json::Value,
}

impl Response {
    /// Creates a response carrying an arbitrary result value.
    pub fn new(id: RequestId, result: serde_json::Value) -> Self {
        Response { id, result }
    }

    /// Creates a response carrying a well-formed envelope.
    pub fn from_envelope(id: RequestId, envelope: super::Envelope) -> Self {
        Response::new(id, envelope.into_value())
    }
}
