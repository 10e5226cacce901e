//! RVMaster Transport Layer
//!
//! This module provides the TCP transport and codec used to talk to the master.
//!
//! # Architecture
//!
//! - **Transport**: TCP, blocking I/O with connect and read/write timeouts
//! - **Codec**: JSON serialization for protocol messages
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! # Components
//!
//! - **[`JsonCodec`]**: Encode/decode protocol messages to JSON
//! - **[`TcpTransport`]**: Blocking client transport (used by the pooled clients)
//! - **[`TcpServer`]**: Threaded server speaking the same framing (used for test masters)
//!
//! # Message Size Limits
//!
//! Both sides refuse frames larger than [`MAX_MESSAGE_SIZE`].
//!
//! # Example
//!
//! ```no_run
//! use rvmaster_common::transport::TcpTransport;
//! use rvmaster_common::protocol::Request;
//! use serde_json::json;
//!
//! let transport = TcpTransport::new();
//! let mut stream = transport.connect("127.0.0.1:11311").unwrap();
//!
//! let request = Request::new("getPid", vec![json!("/test_node")]);
//! let response = transport.send_request(&mut stream, &request).unwrap();
//! ```

pub mod codec;
pub mod tcp;
pub mod tcp_server;

pub use codec::JsonCodec;
pub use tcp::TcpTransport;
pub use tcp_server::TcpServer;

/// Largest frame either side will accept (100 MB).
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;
