use std::collections::HashMap;
use std::time::Duration;

use crate::endpoint::MasterEndpoint;
use crate::error::ConfigError;

/// Caller id used when none is configured.
pub const DEFAULT_CALLER_ID: &str = "/rvmaster_client";

/// Override map key naming the caller.
pub const NAME_REMAP_KEY: &str = "__name";

/// Sleep between attempts while waiting for the master.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);

/// Whether transport invocations are serialized through one process-wide lock.
///
/// Some transport stacks are not safe to drive from several threads at once.
/// When serialization is on, the lock is held around the transport call only,
/// never across the backoff sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallSerialization {
    /// On for macOS, off elsewhere.
    #[default]
    PlatformDefault,
    Always,
    Never,
}

impl CallSerialization {
    pub fn is_enabled(self) -> bool {
        match self {
            CallSerialization::PlatformDefault => cfg!(target_os = "macos"),
            CallSerialization::Always => true,
            CallSerialization::Never => false,
        }
    }
}

/// Client configuration.
///
/// Built once at startup and then treated as read-only. The only value that
/// may change afterwards is the retry timeout, through
/// [`MasterClient::set_retry_timeout`](crate::MasterClient::set_retry_timeout).
///
/// # Default Configuration
///
/// - `caller_id`: `/rvmaster_client`
/// - `retry_timeout`: zero (wait forever)
/// - `backoff`: 50ms
/// - `serialization`: [`CallSerialization::PlatformDefault`]
#[derive(Debug, Clone, PartialEq)]
pub struct MasterConfig {
    endpoint: MasterEndpoint,
    caller_id: String,
    retry_timeout: Duration,
    backoff: Duration,
    serialization: CallSerialization,
}

impl MasterConfig {
    pub fn new(endpoint: MasterEndpoint) -> Self {
        Self {
            endpoint,
            caller_id: DEFAULT_CALLER_ID.to_string(),
            retry_timeout: Duration::ZERO,
            backoff: DEFAULT_BACKOFF,
            serialization: CallSerialization::default(),
        }
    }

    /// Resolves the endpoint and caller id from an override map.
    ///
    /// The endpoint follows [`MasterEndpoint::resolve`]; the caller id is the
    /// non-empty `__name` override when present.
    pub fn from_overrides(overrides: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let endpoint = MasterEndpoint::resolve(overrides)?;
        Ok(Self::with_overrides(endpoint, overrides))
    }

    fn with_overrides(endpoint: MasterEndpoint, overrides: &HashMap<String, String>) -> Self {
        let config = Self::new(endpoint);
        match overrides.get(NAME_REMAP_KEY).filter(|name| !name.is_empty()) {
            Some(name) => config.with_caller_id(name.clone()),
            None => config,
        }
    }

    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = caller_id.into();
        self
    }

    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    /// Sets the retry timeout from seconds, rejecting negative or non-finite values.
    pub fn with_retry_timeout_secs(self, seconds: f64) -> Result<Self, ConfigError> {
        Ok(self.with_retry_timeout(retry_timeout_from_secs(seconds)?))
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_serialization(mut self, serialization: CallSerialization) -> Self {
        self.serialization = serialization;
        self
    }

    pub fn endpoint(&self) -> &MasterEndpoint {
        &self.endpoint
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    /// Initial retry timeout. Zero means wait forever.
    pub fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn serialization(&self) -> CallSerialization {
        self.serialization
    }
}

/// Converts seconds to a retry timeout.
pub fn retry_timeout_from_secs(seconds: f64) -> Result<Duration, ConfigError> {
    if seconds.is_nan() || seconds < 0.0 {
        return Err(ConfigError::InvalidRetryTimeout(seconds));
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidRetryTimeout(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> MasterEndpoint {
        MasterEndpoint::parse("http://localhost:11311").unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = MasterConfig::new(endpoint());
        assert_eq!(config.caller_id(), "/rvmaster_client");
        assert!(config.retry_timeout().is_zero());
        assert_eq!(config.backoff(), Duration::from_millis(50));
        assert_eq!(config.serialization(), CallSerialization::PlatformDefault);
    }

    #[test]
    fn test_name_override() {
        let overrides = HashMap::from([(NAME_REMAP_KEY.to_string(), "/talker".to_string())]);
        let config = MasterConfig::with_overrides(endpoint(), &overrides);
        assert_eq!(config.caller_id(), "/talker");

        let empty = HashMap::from([(NAME_REMAP_KEY.to_string(), String::new())]);
        let config = MasterConfig::with_overrides(endpoint(), &empty);
        assert_eq!(config.caller_id(), DEFAULT_CALLER_ID);
    }

    #[test]
    fn test_retry_timeout_from_secs() {
        assert_eq!(retry_timeout_from_secs(0.0), Ok(Duration::ZERO));
        assert_eq!(retry_timeout_from_secs(1.5), Ok(Duration::from_millis(1500)));
        assert_eq!(retry_timeout_from_secs(-0.5), Err(ConfigError::InvalidRetryTimeout(-0.5)));
        assert!(retry_timeout_from_secs(f64::NAN).is_err());
        assert!(retry_timeout_from_secs(f64::INFINITY).is_err());
    }

    #[test]
    fn test_with_retry_timeout_secs_rejects_negative() {
        let result = MasterConfig::new(endpoint()).with_retry_timeout_secs(-1.0);
        assert_eq!(result, Err(ConfigError::InvalidRetryTimeout(-1.0)));
    }

    #[test]
    fn test_serialization_policy() {
        assert!(CallSerialization::Always.is_enabled());
        assert!(!CallSerialization::Never.is_enabled());
        assert_eq!(
            CallSerialization::PlatformDefault.is_enabled(),
            cfg!(target_os = "macos")
        );
    }
}
