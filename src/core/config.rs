//! Client configuration.
//!
//! Follows the defaults of the collection service: a local endpoint, no
//! credential, and a sentinel service name. Values can be overridden
//! programmatically or through `TRACELINE_*` environment variables.

use crate::core::error::{Result, TracelineError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default collection service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

/// Service name stamped on traces when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "unknown-service";

/// Default bound on outbound HTTP calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`TraceClient`](crate::client::TraceClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the collection service.
    pub endpoint: String,
    /// Credential sent as a bearer header on every request.
    pub api_key: Option<String>,
    /// Name of the service being traced.
    pub service_name: Option<String>,
    /// Bound on outbound HTTP calls.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            service_name: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection service endpoint.
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the API key.
    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the service name.
    pub fn service_name<S: Into<String>>(mut self, service_name: S) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Sets the outbound request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Applies `TRACELINE_ENDPOINT`, `TRACELINE_API_KEY` and
    /// `TRACELINE_SERVICE_NAME` environment overrides.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("TRACELINE_ENDPOINT") {
            if !endpoint.is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(api_key) = std::env::var("TRACELINE_API_KEY") {
            if !api_key.is_empty() {
                self.api_key = Some(api_key);
            }
        }
        if let Ok(service_name) = std::env::var("TRACELINE_SERVICE_NAME") {
            if !service_name.is_empty() {
                self.service_name = Some(service_name);
            }
        }
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(TracelineError::config("endpoint cannot be empty"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(TracelineError::config(format!(
                "endpoint must be an http(s) URL, got {}",
                self.endpoint
            )));
        }
        if self.timeout.is_zero() {
            return Err(TracelineError::config("timeout must be positive"));
        }
        Ok(())
    }

    /// Returns the endpoint with any trailing slash removed.
    pub fn normalized_endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Returns the configured service name or the sentinel default.
    pub fn resolved_service_name(&self) -> &str {
        self.service_name.as_deref().unwrap_or(DEFAULT_SERVICE_NAME)
    }
}
