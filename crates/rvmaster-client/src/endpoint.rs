//! Master address resolution.
//!
//! The master URI comes from, in order:
//!
//! 1. the `__master` entry of the caller's override map, when non-empty
//! 2. the `REAL_MASTER_URI` environment variable
//!
//! If neither is present resolution fails with
//! [`ConfigError::MissingMasterUri`]. The URI must have the form
//! `scheme://host:port[/path]`; schemes with a well-known default port (such
//! as `http`) may omit the port.

use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::error::ConfigError;
use crate::pool::EndpointKey;

/// Environment variable naming the master URI.
pub const MASTER_URI_ENV: &str = "REAL_MASTER_URI";

/// Override map key naming the master URI.
pub const MASTER_REMAP_KEY: &str = "__master";

/// Where the master lives.
///
/// Only obtainable through resolution or [`parse`](Self::parse), so a
/// constructed endpoint always has a non-empty host and a port in 1–65535.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MasterEndpoint {
    host: String,
    port: u16,
    uri: String,
}

impl MasterEndpoint {
    /// Resolves the endpoint from `overrides`, falling back to the environment.
    pub fn resolve(overrides: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::resolve_from(overrides, std::env::var(MASTER_URI_ENV).ok())
    }

    /// Like [`resolve`](Self::resolve) with the environment value supplied.
    pub fn resolve_from(
        overrides: &HashMap<String, String>,
        env_value: Option<String>,
    ) -> Result<Self, ConfigError> {
        let uri = match overrides.get(MASTER_REMAP_KEY).filter(|uri| !uri.is_empty()) {
            Some(uri) => uri.clone(),
            None => env_value.ok_or(ConfigError::MissingMasterUri)?,
        };

        Self::parse(&uri)
    }

    /// Splits `uri` into host and port.
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidMasterUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid("missing host")),
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;
        if port == 0 {
            return Err(invalid("port must be between 1 and 65535"));
        }

        Ok(Self {
            host,
            port,
            uri: uri.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The URI exactly as configured.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Pool key for calls to `path` on this endpoint.
    pub fn key(&self, path: &str) -> EndpointKey {
        EndpointKey::new(self.host.clone(), self.port, path)
    }
}

impl fmt::Display for MasterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
