//! Root Error Type
//!
//! Unified error for the binary entry points. Module-level errors convert
//! into this via `#[from]`; library code keeps its per-module error types.

use thiserror::Error;

/// Root error type for the peg-in client
#[derive(Debug, Error)]
pub enum PeginError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    /// Wallet connection errors
    #[error("wallet error: {0}")]
    Connect(#[from] crate::connect::ConnectError),

    /// Session/orchestration errors
    #[error("session error: {0}")]
    Session(#[from] crate::session::service::SessionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using PeginError
pub type Result<T> = std::result::Result<T, PeginError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_error_conversion() {
        let err: PeginError = ConfigError::MissingEnvVar("PEGIN_STX_ADDRESS".to_string()).into();
        assert!(err.to_string().contains("PEGIN_STX_ADDRESS"));
    }
}
