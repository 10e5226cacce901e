use rvmaster_common::protocol::error::{Result, RvError};
use rvmaster_common::protocol::Request;
use rvmaster_common::transport::TcpTransport;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shortest connect timeout a capped handle will use.
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(1);

/// Identifies a remote RPC endpoint: host, port and request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl EndpointKey {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// `host:port`, suitable for connecting.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}

/// A transport handle able to perform one call at a time.
pub trait RpcHandle: Send {
    /// Performs `method` with positional `params`, returning the raw result.
    ///
    /// `Err` means no response was obtained (connect failure, I/O error,
    /// broken framing). Any response at all, including an error envelope, is
    /// `Ok`.
    fn call(&mut self, method: &str, params: &[Value]) -> Result<Value>;

    /// Caps how long the next connect may take, so an attempt does not run
    /// far past the caller's retry timeout. `None` lifts the cap.
    fn limit_connect(&mut self, _budget: Option<Duration>) {}
}

/// A shared pool of reusable transport handles.
///
/// Implementations must be safe to use from many threads at once.
pub trait TransportPool: Send + Sync {
    type Handle: RpcHandle;

    /// Hands out an idle handle for `key`, or a new one.
    fn acquire(&self, key: &EndpointKey) -> Self::Handle;

    /// Takes a handle back.
    fn release(&self, handle: Self::Handle);

    /// Whether the pool is being torn down.
    fn is_shutting_down(&self) -> bool;
}

/// Connection pool configuration.
///
/// # Default Configuration
///
/// - `max_idle_per_endpoint`: 8
/// - `connect_timeout_ms`: 5000
/// - `io_timeout_ms`: 5000
///
/// # Example
///
/// ```rust
/// use rvmaster_client::PoolConfig;
///
/// let config = PoolConfig {
///     max_idle_per_endpoint: 2,
///     ..PoolConfig::default()
/// };
/// assert_eq!(config.connect_timeout_ms, 5000);
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle handles kept per endpoint; extra released handles are closed
    pub max_idle_per_endpoint: usize,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds
    pub io_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_endpoint: 8,
            connect_timeout_ms: 5000,
            io_timeout_ms: 5000,
        }
    }
}

/// A pooled master connection.
///
/// Connects lazily on the first call and reconnects on the next call after
/// any transport failure, so a handle acquired before the master is up
/// becomes usable as soon as the master accepts connections.
pub struct RpcClient {
    key: EndpointKey,
    transport: TcpTransport,
    stream: Option<TcpStream>,
    connect_budget: Option<Duration>,
}

impl RpcClient {
    pub fn new(key: EndpointKey, transport: TcpTransport) -> Self {
        Self {
            key,
            transport,
            stream: None,
            connect_budget: None,
        }
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Timeout the next connect will use: the pool's connect timeout,
    /// shortened to the current budget if one is set.
    pub fn connect_timeout(&self) -> Duration {
        let configured = self.transport.connect_timeout();
        match self.connect_budget {
            Some(budget) => budget.max(MIN_CONNECT_TIMEOUT).min(configured),
            None => configured,
        }
    }
}

impl RpcHandle for RpcClient {
    fn call(&mut self, method: &str, params: &[Value]) -> Result<Value> {
        if self.stream.is_none() {
            let transport =
                TcpTransport::with_timeouts(self.connect_timeout(), self.transport.io_timeout());
            self.stream = Some(transport.connect(&self.key.addr())?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(RvError::Connection(format!("not connected to {}", self.key)));
        };

        let request = Request::new(method, params.to_vec());
        match self.transport.send_request(stream, &request) {
            Ok(response) => Ok(response.result),
            Err(e) => {
                // The stream may be mid-frame; never reuse it
                self.stream = None;
                Err(e)
            }
        }
    }

    fn limit_connect(&mut self, budget: Option<Duration>) {
        self.connect_budget = budget;
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("key", &self.key)
            .field("connected", &self.is_connected())
            .field("connect_budget", &self.connect_budget)
            .finish()
    }
}

/// Pool of TCP master connections.
///
/// # Architecture
///
/// - Idle handles are grouped by [`EndpointKey`]
/// - LIFO reuse, so the most recently used (and most likely still open)
///   connection is handed out first
/// - At most `max_idle_per_endpoint` idle handles are kept per key
/// - After [`shutdown`](Self::shutdown) all idle handles are closed and any
///   handle released afterwards is dropped
///
/// # Thread Safety
///
/// Bookkeeping is protected by a mutex; the mutex is never held during I/O.
///
/// # Example
///
/// ```rust
/// use rvmaster_client::{EndpointKey, PoolConfig, TcpPool, TransportPool};
///
/// let pool = TcpPool::new(PoolConfig::default());
/// let key = EndpointKey::new("127.0.0.1", 11311, "/");
///
/// let client = pool.acquire(&key);
/// pool.release(client);
/// assert_eq!(pool.idle_count(&key), 1);
/// ```
pub struct TcpPool {
    transport: TcpTransport,
    config: PoolConfig,
    idle: Mutex<HashMap<EndpointKey, Vec<RpcClient>>>,
    shutting_down: AtomicBool,
}

impl TcpPool {
    pub fn new(config: PoolConfig) -> Self {
        let transport = TcpTransport::with_timeouts(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.io_timeout_ms),
        );

        Self {
            transport,
            config,
            idle: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of idle handles held for `key`.
    pub fn idle_count(&self, key: &EndpointKey) -> usize {
        self.lock_idle().get(key).map_or(0, Vec::len)
    }

    /// Marks the pool as shutting down and closes all idle handles.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let closed: usize = self.lock_idle().drain().map(|(_, clients)| clients.len()).sum();
        tracing::debug!(closed, "connection pool shut down");
    }

    fn lock_idle(&self) -> MutexGuard<'_, HashMap<EndpointKey, Vec<RpcClient>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TcpPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl TransportPool for TcpPool {
    type Handle = RpcClient;

    fn acquire(&self, key: &EndpointKey) -> RpcClient {
        if let Some(client) = self.lock_idle().get_mut(key).and_then(Vec::pop) {
            return client;
        }

        RpcClient::new(key.clone(), self.transport)
    }

    fn release(&self, client: RpcClient) {
        if self.is_shutting_down() {
            return;
        }

        let mut idle = self.lock_idle();
        let slot = idle.entry(client.key.clone()).or_default();
        if slot.len() < self.config.max_idle_per_endpoint {
            slot.push(client);
        } else {
            tracing::debug!(key = %client.key, "idle limit reached, closing released connection");
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}
