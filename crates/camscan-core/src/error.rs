//! Application error types with rich context

use thiserror::Error;

use crate::failure::{FailureKind, ScanFailure};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Runtime error: {message}")]
    Runtime { message: String },

    // ─────────────────────────────────────────────────────────────
    // Capture/Engine Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Scan failure: {0}")]
    Scan(#[from] ScanFailure),

    #[error("No decode engine registered as '{engine}'")]
    UnknownEngine { engine: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Replay fixture error: {message}")]
    Replay { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn unknown_engine(engine: impl Into<String>) -> Self {
        Self::UnknownEngine {
            engine: engine.into(),
        }
    }

    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    pub fn replay(message: impl Into<String>) -> Self {
        Self::Replay {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    /// The classified failure kind, if this error came from an adapter
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::Scan(failure) => Some(failure.kind),
            Error::UnknownEngine { .. } => Some(FailureKind::EngineInitError),
            _ => None,
        }
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Scan(failure) => !failure.kind.aborts_fallback(),
            Error::Capture { .. } | Error::Engine { .. } | Error::ChannelSend { .. } => true,
            _ => false,
        }
    }

    /// Check if this error should end the current session start outright
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Scan(failure) => failure.kind.aborts_fallback(),
            Error::UnknownEngine { .. } | Error::ChannelClosed => true,
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::capture("release failed");
        assert_eq!(err.to_string(), "Capture error: release failed");

        let err = Error::unknown_engine("quagga");
        assert!(err.to_string().contains("'quagga'"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_scan_failure() {
        let err: Error = ScanFailure::permission_denied("user said no").into();
        assert_eq!(err.failure_kind(), Some(FailureKind::PermissionDenied));
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::from(ScanFailure::busy("transitioning")).is_recoverable());
        assert!(Error::from(ScanFailure::constraint_rejected("1920x1080")).is_recoverable());
        assert!(Error::engine("stop failed").is_recoverable());
        assert!(!Error::ChannelClosed.is_recoverable());
    }

    #[test]
    fn test_unknown_engine_is_engine_init() {
        let err = Error::unknown_engine("scandit");
        assert_eq!(err.failure_kind(), Some(FailureKind::EngineInitError));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_context_passes_error_through() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.context("reading fixture").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
