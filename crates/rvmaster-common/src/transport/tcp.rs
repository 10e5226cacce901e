use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::protocol::{Request, Response};
use crate::protocol::error::{Result, RvError};
use crate::transport::codec::JsonCodec;
use crate::transport::MAX_MESSAGE_SIZE;

/// Default timeout for TCP operations (5 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking TCP transport.
///
/// Provides connect and framed request/response I/O with built-in timeouts.
/// The transport itself holds no connection state; callers own the
/// [`TcpStream`] and decide when to reuse or drop it.
///
/// # Wire Protocol
///
/// ```text
/// [4-byte length] [JSON data]
/// ```
///
/// # Example
///
/// ```no_run
/// use rvmaster_common::transport::TcpTransport;
/// use rvmaster_common::protocol::Request;
/// use serde_json::json;
///
/// let transport = TcpTransport::new();
/// let mut stream = transport.connect("127.0.0.1:11311").unwrap();
///
/// let request = Request::new("getSystemState", vec![json!("/test_node")]);
/// let response = transport.send_request(&mut stream, &request).unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl TcpTransport {
    /// Creates a transport using [`DEFAULT_TIMEOUT`] for connect and I/O.
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_TIMEOUT, DEFAULT_TIMEOUT)
    }

    /// Creates a transport with explicit connect and read/write timeouts.
    ///
    /// Zero durations are not accepted by the socket API and are replaced by
    /// [`DEFAULT_TIMEOUT`].
    pub fn with_timeouts(connect_timeout: Duration, io_timeout: Duration) -> Self {
        let nonzero = |d: Duration| if d.is_zero() { DEFAULT_TIMEOUT } else { d };
        Self {
            connect_timeout: nonzero(connect_timeout),
            io_timeout: nonzero(io_timeout),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Connects to a remote endpoint.
    ///
    /// The address may resolve to several socket addresses; each is tried in
    /// turn until one accepts.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The address cannot be resolved
    /// - Connection fails to all resolved addresses
    /// - Timeouts cannot be set on the stream
    pub fn connect(&self, addr: &str) -> Result<TcpStream> {
        let socket_addrs = addr
            .to_socket_addrs()
            .map_err(|e| RvError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect_timeout(&socket_addr, self.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.io_timeout))
                        .map_err(|e| RvError::Connection(format!("Failed to set read timeout: {}", e)))?;
                    stream
                        .set_write_timeout(Some(self.io_timeout))
                        .map_err(|e| RvError::Connection(format!("Failed to set write timeout: {}", e)))?;
                    stream
                        .set_nodelay(true)
                        .map_err(|e| RvError::Connection(format!("Failed to set nodelay: {}", e)))?;

                    return Ok(stream);
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(RvError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    /// Sends a request and waits for the matching response.
    ///
    /// A response carrying a different id than the request means the stream is
    /// out of step and is reported as a transport error.
    pub fn send_request(&self, stream: &mut TcpStream, request: &Request) -> Result<Response> {
        let encoded = JsonCodec::encode_request(request)?;
        self.send_message(stream, &encoded)?;

        let response_data = self.receive_message(stream)?;
        let response = JsonCodec::decode_response(&response_data)?;

        if response.id != request.id {
            return Err(RvError::Transport(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        Ok(response)
    }

    /// Sends a message with length prefix.
    pub fn send_message(&self, stream: &mut TcpStream, data: &[u8]) -> Result<()> {
        write_frame(stream, data).map_err(|e| self.map_io_error(e, "sending frame"))
    }

    /// Receives a message with length prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the frame exceeds
    /// [`MAX_MESSAGE_SIZE`].
    pub fn receive_message(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .map_err(|e| self.map_io_error(e, "reading length prefix"))?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(RvError::InvalidResponse(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .map_err(|e| self.map_io_error(e, "reading data"))?;

        Ok(buf)
    }

    /// Map IO errors to appropriate RvError variants
    ///
    /// - Timeouts/would block -> `Timeout`
    /// - Connection errors -> `Connection`
    /// - Other IO errors -> `Io`
    fn map_io_error(&self, err: std::io::Error, context: &str) -> RvError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                RvError::Timeout(self.io_timeout.as_millis() as u64)
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => {
                RvError::Connection(format!("{}: Connection lost", context))
            }
            _ => RvError::Io(err),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `[len][data]` and flushes.
pub(crate) fn write_frame(stream: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame length exceeds u32")
    })?;

    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(data)?;
    stream.flush()
}
