//! Outbound notifications from the session controller
//!
//! The controller reports through a [`NotificationSink`]. Sinks receive
//! borrowed, immutable notification values and never call back into the
//! controller.

use std::sync::Arc;

use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, SessionState};
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::session::SessionId;

/// An accepted, debounced detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub session_id: SessionId,
    pub value: String,
    pub format: BarcodeFormat,
    pub timestamp: DateTime<Local>,
    /// Presentation layer should give haptic feedback
    pub haptic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub session_id: SessionId,
    pub previous: SessionState,
    pub new: SessionState,
    pub reason: String,
}

/// Reported once when a session start cannot recover
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatalError {
    pub session_id: SessionId,
    pub kind: FailureKind,
    pub message: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn on_result(&self, result: &ScanResult);

    fn on_state_change(&self, change: &StateChange);

    fn on_fatal_error(&self, error: &FatalError);
}

/// Owned notification, as carried over a broadcast channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionNotification {
    Result(ScanResult),
    StateChanged(StateChange),
    FatalError(FatalError),
}

// ─────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────

/// Re-broadcasts every notification to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SessionNotification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
        self.tx.subscribe()
    }

    fn send(&self, notification: SessionNotification) {
        // No subscribers is fine
        let _ = self.tx.send(notification);
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationSink for BroadcastSink {
    fn on_result(&self, result: &ScanResult) {
        self.send(SessionNotification::Result(result.clone()));
    }

    fn on_state_change(&self, change: &StateChange) {
        self.send(SessionNotification::StateChanged(change.clone()));
    }

    fn on_fatal_error(&self, error: &FatalError) {
        self.send(SessionNotification::FatalError(error.clone()));
    }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn on_result(&self, result: &ScanResult) {
        info!(
            "Session {}: scanned {} ({})",
            result.session_id, result.value, result.format
        );
    }

    fn on_state_change(&self, change: &StateChange) {
        debug!(
            "Session {}: {} -> {} ({})",
            change.session_id, change.previous, change.new, change.reason
        );
    }

    fn on_fatal_error(&self, error: &FatalError) {
        error!(
            "Session {} failed: {}: {}",
            error.session_id, error.kind, error.message
        );
    }
}

/// Forwards to every inner sink in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanoutSink {
    fn on_result(&self, result: &ScanResult) {
        for sink in &self.sinks {
            sink.on_result(result);
        }
    }

    fn on_state_change(&self, change: &StateChange) {
        for sink in &self.sinks {
            sink.on_state_change(change);
        }
    }

    fn on_fatal_error(&self, error: &FatalError) {
        for sink in &self.sinks {
            sink.on_fatal_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(previous: SessionState, new: SessionState) -> StateChange {
        StateChange {
            session_id: 7,
            previous,
            new,
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.on_state_change(&change(SessionState::Idle, SessionState::Negotiating));
        sink.on_fatal_error(&FatalError {
            session_id: 7,
            kind: FailureKind::PermissionDenied,
            message: "denied".to_string(),
        });

        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionNotification::StateChanged(StateChange {
                new: SessionState::Negotiating,
                ..
            })
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionNotification::FatalError(_)
        ));
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let sink = BroadcastSink::default();
        sink.on_state_change(&change(SessionState::Stopping, SessionState::Idle));
    }

    #[test]
    fn test_fanout_forwards_to_all() {
        let mut first = MockNotificationSink::new();
        first.expect_on_state_change().times(1).return_const(());
        let mut second = MockNotificationSink::new();
        second
            .expect_on_state_change()
            .withf(|c| c.new == SessionState::Running)
            .times(1)
            .return_const(());

        let fanout = FanoutSink::new()
            .with(Arc::new(first))
            .with(Arc::new(second));
        assert_eq!(fanout.len(), 2);

        fanout.on_state_change(&change(SessionState::Acquiring, SessionState::Running));
    }

    #[test]
    fn test_notification_serializes_tagged() {
        let json = serde_json::to_string(&SessionNotification::StateChanged(change(
            SessionState::Running,
            SessionState::Stopping,
        )))
        .unwrap();
        assert!(json.contains("\"type\":\"state_changed\""));
        assert!(json.contains("\"new\":\"stopping\""));
    }
}
