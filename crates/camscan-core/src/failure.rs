//! Classified acquisition and engine failures
//!
//! Every failure an engine adapter or capture subsystem reports carries a
//! [`FailureKind`]. The kind alone decides whether the controller retries the
//! same candidate, advances the candidate chain, or gives up.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy shared by every engine and capture back-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Camera permission refused. Fatal, no retry or fallback.
    PermissionDenied,
    /// Requested device is absent. Fatal only once the chain is exhausted.
    DeviceNotFound,
    /// Device refused the requested constraints. Advances the chain.
    ConstraintRejected,
    /// Hardware still busy or transitioning from a previous session.
    ResourceBusyTransient,
    /// Engine could not allocate its internal resources. Fatal for that engine.
    EngineInitError,
    /// Frame-level decode miss. Never surfaced.
    DecodeNoiseTransient,
    /// An acquisition attempt exceeded its time bound. Treated as permanent
    /// for the candidate.
    AcquireTimeout,
}

/// Whether a failure is expected to clear without changing the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Transient,
    Permanent,
}

impl FailureKind {
    pub fn class(self) -> FailureClass {
        match self {
            FailureKind::ResourceBusyTransient | FailureKind::DecodeNoiseTransient => {
                FailureClass::Transient
            }
            FailureKind::PermissionDenied
            | FailureKind::DeviceNotFound
            | FailureKind::ConstraintRejected
            | FailureKind::EngineInitError
            | FailureKind::AcquireTimeout => FailureClass::Permanent,
        }
    }

    pub fn is_transient(self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// Kinds that end a start attempt immediately, skipping the rest of the chain
    pub fn aborts_fallback(self) -> bool {
        matches!(
            self,
            FailureKind::PermissionDenied | FailureKind::EngineInitError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::DeviceNotFound => "device_not_found",
            FailureKind::ConstraintRejected => "constraint_rejected",
            FailureKind::ResourceBusyTransient => "resource_busy_transient",
            FailureKind::EngineInitError => "engine_init_error",
            FailureKind::DecodeNoiseTransient => "decode_noise_transient",
            FailureKind::AcquireTimeout => "acquire_timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure reported by an adapter or capture subsystem
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize, Serialize)]
#[error("{kind}: {message}")]
pub struct ScanFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ScanFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(FailureKind::PermissionDenied, message)
    }

    pub fn device_not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DeviceNotFound, message)
    }

    pub fn constraint_rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ConstraintRejected, message)
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ResourceBusyTransient, message)
    }

    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::new(FailureKind::EngineInitError, message)
    }

    pub fn decode_noise(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DecodeNoiseTransient, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::AcquireTimeout, message)
    }

    pub fn class(&self) -> FailureClass {
        self.kind.class()
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classes() {
        assert_eq!(FailureKind::ResourceBusyTransient.class(), FailureClass::Transient);
        assert_eq!(FailureKind::DecodeNoiseTransient.class(), FailureClass::Transient);
        assert_eq!(FailureKind::ConstraintRejected.class(), FailureClass::Permanent);
        assert_eq!(FailureKind::DeviceNotFound.class(), FailureClass::Permanent);
        assert_eq!(FailureKind::AcquireTimeout.class(), FailureClass::Permanent);
    }

    #[test]
    fn test_aborts_fallback() {
        assert!(FailureKind::PermissionDenied.aborts_fallback());
        assert!(FailureKind::EngineInitError.aborts_fallback());
        assert!(!FailureKind::ConstraintRejected.aborts_fallback());
        assert!(!FailureKind::ResourceBusyTransient.aborts_fallback());
    }

    #[test]
    fn test_scan_failure_display() {
        let failure = ScanFailure::busy("device is already under transition");
        assert!(failure.is_transient());
        assert_eq!(
            failure.to_string(),
            "resource_busy_transient: device is already under transition"
        );
    }

    #[test]
    fn test_failure_kind_serde() {
        let json = serde_json::to_string(&FailureKind::ConstraintRejected).unwrap();
        assert_eq!(json, "\"constraint_rejected\"");
    }
}
