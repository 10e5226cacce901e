use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub type RequestId = u64;
pub type MethodName = String;
pub type RpcParams = Vec<serde_json::Value>;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A call against the master: method name plus positional arguments.
///
/// The first positional argument of every master method is the caller id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: MethodName,
    #[serde(default)]
    pub params: RpcParams,
}

impl Request {
    pub fn new(method: impl Into<String>, params: RpcParams) -> Self {
        Request {
            id: generate_request_id(),
            method: method.into(),
            params,
        }
    }

    /// Positional argument `index`, if present.
    pub fn param(&self, index: usize) -> Option<&serde_json::Value> {
        self.params.get(index)
    }
}

fn generate_request_id() -> RequestId {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    // Upper 32 bits from the clock, lower 32 bits from the counter
    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    (timestamp & 0xFFFFFFFF00000000) | (counter & 0xFFFFFFFF)
}
