use thiserror::Error;

/// Errors produced by the traceline SDK.
#[derive(Error, Debug)]
pub enum TracelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid span data: {0}")]
    InvalidSpan(String),

    #[error("Invalid trace data: {0}")]
    InvalidTrace(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Result type alias for traceline operations.
pub type Result<T> = std::result::Result<T, TracelineError>;

impl TracelineError {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new invalid-span error.
    pub fn invalid_span<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSpan(msg.into())
    }

    /// Creates a new invalid-trace error.
    pub fn invalid_trace<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTrace(msg.into())
    }

    /// Creates a new network error.
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a new authentication error.
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }

    /// Returns true if this error is recoverable by retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Timeout { .. } => true,
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Returns the error category for metrics/logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidSpan(_) | Self::InvalidTrace(_) => "validation",
            Self::Network(_) | Self::Transport(_) => "network",
            Self::Auth(_) => "auth",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Timeout { .. } => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TracelineError::config("missing endpoint");
        assert_eq!(err.to_string(), "Configuration error: missing endpoint");
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(TracelineError::network("connection refused").is_recoverable());
        assert!(TracelineError::Timeout { timeout_ms: 5000 }.is_recoverable());
        assert!(!TracelineError::config("bad endpoint").is_recoverable());
        assert!(!TracelineError::invalid_span("empty id").is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(TracelineError::invalid_trace("mismatch").category(), "validation");
        assert_eq!(TracelineError::auth("bad key").category(), "auth");
        assert_eq!(TracelineError::Timeout { timeout_ms: 1 }.category(), "timeout");
    }
}
