use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::protocol::{Envelope, Request, Response};
use crate::protocol::error::{Result, RvError};
use crate::transport::codec::JsonCodec;
use crate::transport::tcp::write_frame;
use crate::transport::MAX_MESSAGE_SIZE;

/// Threaded blocking TCP server speaking the master framing.
///
/// One OS thread per connection; each connection serves requests until the
/// peer closes it. Handler errors are turned into an error envelope so the
/// caller always receives a response for every request it sends.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Creates a new TCP server bound to the specified address.
    ///
    /// # Arguments
    /// * `bind_addr` - The address to bind to (e.g., "127.0.0.1:0")
    pub fn bind(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .map_err(|e| RvError::Connection(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self { listener })
    }

    /// Gets the actual bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| RvError::Connection(format!("Failed to get local addr: {}", e)))
    }

    /// Accepts connections forever, serving each on its own thread.
    pub fn run_with_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(Request) -> Result<Response> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);

        loop {
            let (stream, peer_addr) = self
                .listener
                .accept()
                .map_err(|e| RvError::Connection(format!("Failed to accept connection: {}", e)))?;

            tracing::debug!(%peer_addr, "connection established");

            let handler = handler.clone();
            thread::spawn(move || {
                if let Err(e) = handle_connection(stream, handler) {
                    tracing::debug!(%peer_addr, error = %e, "connection error");
                }
            });
        }
    }

    /// Runs [`run_with_handler`](Self::run_with_handler) on a background thread.
    pub fn spawn<F>(self, handler: F) -> thread::JoinHandle<Result<()>>
    where
        F: Fn(Request) -> Result<Response> + Send + Sync + 'static,
    {
        thread::spawn(move || self.run_with_handler(handler))
    }
}

/// Serves requests on one connection until the peer closes it.
fn handle_connection<F>(mut stream: TcpStream, handler: Arc<F>) -> Result<()>
where
    F: Fn(Request) -> Result<Response> + Send + Sync + 'static,
{
    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => {
                return Err(RvError::Connection(format!("Failed to read length: {}", e)));
            }
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(RvError::InvalidRequest(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .map_err(|e| RvError::Connection(format!("Failed to read data: {}", e)))?;

        let request = match JsonCodec::decode_request(&buf) {
            Ok(req) => req,
            Err(e) => {
                let response = Response::from_envelope(0, Envelope::error(e.to_string()));
                send_response(&mut stream, &response)?;
                continue;
            }
        };

        let request_id = request.id;
        let response = handler(request)
            .unwrap_or_else(|e| Response::from_envelope(request_id, Envelope::error(e.to_string())));

        send_response(&mut stream, &response)?;
    }
}

fn send_response(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let encoded = JsonCodec::encode_response(response)?;
    write_frame(stream, &encoded)
        .map_err(|e| RvError::Connection(format!("Failed to send response: {}", e)))
}
