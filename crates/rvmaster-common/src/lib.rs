//! RVMaster Common Types and Transport
//!
//! This crate provides the protocol definitions and TCP transport layer shared
//! by the rvmaster client and anything that stands in for the master (test
//! masters, tooling).
//!
//! # Overview
//!
//! Every remote call made against the master is a positional-argument
//! request answered by an *envelope*: a three element array carrying a status
//! code, a human readable status message and the method specific payload.
//!
//! - **Protocol Layer**: Request/Response types, the envelope, error handling
//! - **Transport Layer**: length-prefixed JSON over TCP
//!
//! # Architecture
//!
//! The wire protocol is deliberately small:
//! - **Transport**: TCP, one request in flight per connection
//! - **Serialization**: JSON
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB
//!
//! # Example
//!
//! ```
//! use rvmaster_common::{Envelope, Request, Response};
//! use serde_json::json;
//!
//! let request = Request::new("getPid", vec![json!("/talker")]);
//! let response = Response::new(request.id, Envelope::success("", json!(4242)).into_value());
//! assert_eq!(request.id, response.id);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
