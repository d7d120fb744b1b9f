//! Headless mode - NDJSON event output
//!
//! Drives one scan session without any presentation layer and writes
//! structured events to stdout, one JSON object per line. Scripts and
//! integration tests parse this instead of a UI.
//!
//! # Example Output
//!
//! ```json
//! {"event":"devices","devices":[{"id":"cam-rear","label":"Back Camera","facing":"environment","capabilities":{"max_width":1920,"max_height":1080,"max_frame_rate":30,"focus_modes":["continuous"]}}],"timestamp":1704700001000}
//! {"event":"state_changed","session_id":1,"previous":"acquiring","state":"running","reason":"capture started","timestamp":1704700001200}
//! {"event":"result","session_id":1,"value":"PALLET-42","format":"code128","haptic":true,"timestamp":1704700001400}
//! ```

pub mod runner;

use std::io::{self, Write};

use camscan_app::{SessionId, SessionNotification};
use camscan_capture::CameraDevice;
use camscan_core::{BarcodeFormat, FailureKind, SessionState};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

/// Events emitted in headless mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Cameras reported by enumeration
    Devices {
        devices: Vec<CameraDevice>,
        timestamp: i64,
    },

    StateChanged {
        session_id: SessionId,
        previous: SessionState,
        state: SessionState,
        reason: String,
        timestamp: i64,
    },

    /// Accepted detection
    Result {
        session_id: SessionId,
        value: String,
        format: BarcodeFormat,
        haptic: bool,
        timestamp: i64,
    },

    FatalError {
        session_id: SessionId,
        kind: FailureKind,
        message: String,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        // Consumers read line by line
        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    pub fn devices(devices: &[CameraDevice]) -> Self {
        Self::Devices {
            devices: devices.to_vec(),
            timestamp: Self::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HeadlessEvent::Devices { .. } => "devices",
            HeadlessEvent::StateChanged { .. } => "state_changed",
            HeadlessEvent::Result { .. } => "result",
            HeadlessEvent::FatalError { .. } => "fatal_error",
        }
    }
}

impl From<&SessionNotification> for HeadlessEvent {
    fn from(notification: &SessionNotification) -> Self {
        match notification {
            SessionNotification::StateChanged(change) => Self::StateChanged {
                session_id: change.session_id,
                previous: change.previous,
                state: change.new,
                reason: change.reason.clone(),
                timestamp: Self::now(),
            },
            SessionNotification::Result(result) => Self::Result {
                session_id: result.session_id,
                value: result.value.clone(),
                format: result.format,
                haptic: result.haptic,
                timestamp: result.timestamp.timestamp_millis(),
            },
            SessionNotification::FatalError(fatal) => Self::FatalError {
                session_id: fatal.session_id,
                kind: fatal.kind,
                message: fatal.message.clone(),
                timestamp: Self::now(),
            },
        }
    }
}
