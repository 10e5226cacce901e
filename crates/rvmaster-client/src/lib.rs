//! RVMaster Client
//!
//! Resolves where the master lives and executes calls against it, waiting
//! for the master to come up when asked to.
//!
//! # Overview
//!
//! - [`MasterEndpoint`]: `(host, port, uri)` resolved from an override map or
//!   the `REAL_MASTER_URI` environment variable
//! - [`MasterConfig`]: endpoint plus call policy (caller id, retry timeout,
//!   backoff, transport serialization)
//! - [`MasterClient`]: the retrying call executor and the query helpers built
//!   on it
//! - [`TcpPool`]: the default pool of reusable master connections
//! - [`spawn_call`]: runs a blocking client operation from async code
//!
//! # Example
//!
//! ```no_run
//! use rvmaster_client::{MasterClient, MasterConfig};
//! use std::collections::HashMap;
//!
//! let config = MasterConfig::from_overrides(&HashMap::new())
//!     .expect("REAL_MASTER_URI must be set");
//! let client = MasterClient::new(config);
//!
//! for topic in client.get_topics().unwrap() {
//!     println!("{} [{}]", topic.name, topic.datatype);
//! }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod pool;
pub mod queries;
pub mod shutdown;
pub mod task;
pub mod validate;

pub use config::{CallSerialization, MasterConfig, DEFAULT_CALLER_ID, NAME_REMAP_KEY};
pub use endpoint::{MasterEndpoint, MASTER_REMAP_KEY, MASTER_URI_ENV};
pub use error::{CallError, ConfigError};
pub use executor::{CallOutcome, MasterClient};
pub use pool::{EndpointKey, PoolConfig, RpcClient, RpcHandle, TcpPool, TransportPool};
pub use queries::TopicInfo;
pub use shutdown::ShutdownSignal;
pub use task::spawn_call;
pub use validate::{EnvelopeValidator, ResponseValidator};
