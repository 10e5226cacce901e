use crate::protocol::{Request, Response};
use crate::protocol::error::Result;

/// JSON codec for encoding/decoding RPC messages
///
/// # Example
///
/// ```
/// use rvmaster_common::transport::JsonCodec;
/// use rvmaster_common::protocol::{Request, Response};
/// use serde_json::json;
///
/// let request = Request::new("getPid", vec![json!("/test_node")]);
/// let encoded = JsonCodec::encode_request(&request).unwrap();
/// let decoded = JsonCodec::decode_request(&encoded).unwrap();
/// assert_eq!(request, decoded);
///
/// let response = Response::new(request.id, json!([1, "", 42]));
/// let encoded = JsonCodec::encode_response(&response).unwrap();
/// let decoded = JsonCodec::decode_response(&encoded).unwrap();
/// assert_eq!(response, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a request to bytes
    pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    /// Decode a request from bytes
    pub fn decode_request(data: &[u8]) -> Result<Request> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Encode a response to bytes
    pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    /// Decode a response from bytes
    pub fn decode_response(data: &[u8]) -> Result<Response> {
        Ok(serde_json::from_slice(data)?)
    }
}
