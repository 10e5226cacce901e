use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
///
/// These are setup mistakes a human has to fix. A process that gets one of
/// these must not carry on with a half-configured client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error(
        "REAL_MASTER_URI is not defined in the environment. Either type the following or \
         (preferably) add it to your shell profile to use your local machine as the master:\n\n\
         export REAL_MASTER_URI=http://localhost:11311\n\n\
         then start the master in another shell."
    )]
    MissingMasterUri,

    #[error("Couldn't parse the master URI [{uri}] into a host:port pair: {reason}")]
    InvalidMasterUri { uri: String, reason: String },

    #[error("retry timeout must be a non-negative number of seconds, got {0}")]
    InvalidRetryTimeout(f64),
}

/// Errors from a call against the master.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// One attempt failed and the caller asked not to wait.
    #[error("[{method}] master at {endpoint} is unavailable")]
    Unavailable { method: String, endpoint: String },

    /// The retry timeout elapsed without a successful attempt.
    #[error("[{method}] timed out trying to connect to the master after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The process or the connection pool is shutting down.
    #[error("call aborted: shutting down")]
    ShuttingDown,

    /// The master answered, but not with something usable.
    #[error("[{method}] invalid response from master: {reason}")]
    InvalidResponse { method: String, reason: String },
}

impl CallError {
    /// Whether calling again later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Unavailable { .. } | CallError::Timeout { .. })
    }
}
