//! The engine adapter contract
//!
//! Every decode back-end is wrapped in an [`EngineAdapter`]. The controller
//! only ever sees this trait, the [`AdapterEvent`] stream and classified
//! [`ScanFailure`]s.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, ConstraintCandidate, DetectionEvent, EngineKind};
use tokio::sync::mpsc;

/// Default pause between processed frames for frame-pull engines
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Events an adapter pushes to its owner while running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    Detection(DetectionEvent),
    /// The capture stream ended without a stop request
    CaptureLost { reason: String },
}

/// Engine configuration applied at `prepare`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Symbologies to report; empty means all
    pub formats: Vec<BarcodeFormat>,
    pub scan_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            formats: vec![BarcodeFormat::Code128],
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

/// What an adapter is prepared into: where to push events, and how to decode
#[derive(Debug, Clone)]
pub struct EngineContainer {
    pub events: mpsc::Sender<AdapterEvent>,
    pub options: EngineOptions,
}

impl EngineContainer {
    pub fn new(events: mpsc::Sender<AdapterEvent>, options: EngineOptions) -> Self {
        Self { events, options }
    }

    /// Build the detection sink engines write into
    pub fn detection_sink(&self) -> DetectionSink {
        DetectionSink::new(self.events.clone(), &self.options.formats)
    }
}

/// Details of a successful start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub device_id: Option<String>,
    pub resolution: Option<(u32, u32)>,
}

/// Uniform lifecycle over one decode back-end
#[async_trait]
pub trait EngineAdapter: Send {
    fn kind(&self) -> EngineKind;

    /// Allocate engine resources. Safe to call again after any `start`/`stop`;
    /// leftovers from a previous run are cleaned up first.
    async fn prepare(
        &mut self,
        container: EngineContainer,
    ) -> std::result::Result<(), ScanFailure>;

    /// Begin capture and decoding for `candidate`
    async fn start(
        &mut self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<Started, ScanFailure>;

    /// Release everything `start` acquired. Safe before, after, or without a
    /// successful `start`; the capture resource is free once this returns.
    async fn stop(&mut self) -> Result<()>;
}

/// Cloneable writer of detection events shared with engine callbacks.
///
/// Drops formats outside the configured filter and clamps timestamps so the
/// stream from one adapter never goes backwards.
#[derive(Debug, Clone)]
pub struct DetectionSink {
    events: mpsc::Sender<AdapterEvent>,
    formats: Arc<[BarcodeFormat]>,
    last_timestamp: Arc<Mutex<Option<Instant>>>,
}

impl DetectionSink {
    pub fn new(events: mpsc::Sender<AdapterEvent>, formats: &[BarcodeFormat]) -> Self {
        Self {
            events,
            formats: formats.into(),
            last_timestamp: Arc::new(Mutex::new(None)),
        }
    }

    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.formats.is_empty() || self.formats.contains(&format)
    }

    /// Push one decoded symbol. Returns `false` once the receiver is gone.
    pub fn emit(&self, value: impl Into<String>, format: BarcodeFormat) -> bool {
        if !self.accepts(format) {
            trace!("Dropping {} detection outside format filter", format);
            return true;
        }

        let timestamp = self.next_timestamp();
        let event = AdapterEvent::Detection(DetectionEvent::new(value, format, timestamp));
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("Detection channel full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Report that the capture stream died underneath the engine
    pub fn capture_lost(&self, reason: impl Into<String>) {
        let event = AdapterEvent::CaptureLost {
            reason: reason.into(),
        };
        if self.events.try_send(event).is_err() {
            debug!("Could not deliver capture-lost event");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    fn next_timestamp(&self) -> Instant {
        // tokio's clock so paused-time tests see virtual time
        let now = tokio::time::Instant::now().into_std();
        let mut last = match self.last_timestamp.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stamped = match *last {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        *last = Some(stamped);
        stamped
    }
}
