//! Frame-pull adapter: capture handle + interval-paced decode loop

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use async_trait::async_trait;
use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, ConstraintCandidate, EngineKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::capture::{CaptureHandle, CaptureSubsystem, Frame};
use crate::engine::{DetectionSink, EngineAdapter, EngineContainer, Started};

/// One symbol found in a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub value: String,
    pub format: BarcodeFormat,
}

impl Symbol {
    pub fn new(value: impl Into<String>, format: BarcodeFormat) -> Self {
        Self {
            value: value.into(),
            format,
        }
    }
}

/// Opaque per-frame decoder
///
/// A fresh clone is moved into the decode loop on every start.
pub trait FrameDecoder: Clone + Send + 'static {
    /// Apply the symbology filter; failures are engine-init failures
    fn configure(&mut self, formats: &[BarcodeFormat]) -> std::result::Result<(), ScanFailure>;

    fn decode(&mut self, frame: &Frame) -> std::result::Result<Vec<Symbol>, ScanFailure>;
}

struct PullLoop {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<CaptureHandle>,
}

/// Reference adapter. Owns acquisition through a [`CaptureSubsystem`].
pub struct FramePullAdapter<C, D> {
    kind: EngineKind,
    capture: C,
    decoder: D,
    container: Option<EngineContainer>,
    running: Option<PullLoop>,
}

impl<C, D> FramePullAdapter<C, D>
where
    C: CaptureSubsystem + Sync + 'static,
    D: FrameDecoder,
{
    pub fn new(kind: impl Into<EngineKind>, capture: C, decoder: D) -> Self {
        Self {
            kind: kind.into(),
            capture,
            decoder,
            container: None,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Stop the decode loop and give the handle back to the capture subsystem
    async fn halt(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let _ = running.shutdown_tx.send(true);
        match running.task.await {
            Ok(handle) => {
                debug!("[{}] releasing capture handle {}", self.kind, handle.id());
                self.capture.release(handle).await
            }
            Err(e) => Err(Error::capture(format!(
                "decode loop for {} ended abnormally: {}",
                self.kind, e
            ))),
        }
    }
}

#[async_trait]
impl<C, D> EngineAdapter for FramePullAdapter<C, D>
where
    C: CaptureSubsystem + Sync + 'static,
    D: FrameDecoder,
{
    fn kind(&self) -> EngineKind {
        self.kind.clone()
    }

    async fn prepare(
        &mut self,
        container: EngineContainer,
    ) -> std::result::Result<(), ScanFailure> {
        if let Err(e) = self.halt().await {
            warn!("[{}] cleanup before prepare failed: {}", self.kind, e);
        }
        self.decoder.configure(&container.options.formats)?;
        self.container = Some(container);
        Ok(())
    }

    async fn start(
        &mut self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<Started, ScanFailure> {
        let container = self
            .container
            .clone()
            .ok_or_else(|| ScanFailure::engine_init(format!("{} started before prepare", self.kind)))?;

        if let Err(e) = self.halt().await {
            warn!("[{}] stale decode loop cleanup failed: {}", self.kind, e);
        }

        let handle = self.capture.acquire(candidate).await?;
        let started = Started {
            device_id: Some(handle.device_id().to_string()),
            resolution: Some(handle.resolution()),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(pull_loop(
            handle,
            self.decoder.clone(),
            container.detection_sink(),
            container.options.scan_interval,
            shutdown_rx,
        ));
        self.running = Some(PullLoop { shutdown_tx, task });

        info!("[{}] capturing with {}", self.kind, candidate);
        Ok(started)
    }

    async fn stop(&mut self) -> Result<()> {
        self.halt().await
    }
}

async fn pull_loop<D: FrameDecoder>(
    mut handle: CaptureHandle,
    mut decoder: D,
    sink: DetectionSink,
    scan_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> CaptureHandle {
    let mut ticker = tokio::time::interval(scan_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let frame = tokio::select! {
            _ = shutdown_rx.changed() => break,
            frame = handle.next_frame() => frame,
        };

        let Some(frame) = frame else {
            sink.capture_lost(format!("capture stream on {} ended", handle.device_id()));
            break;
        };

        // A panicking decoder costs the frame, never the handle
        let decoded = match catch_unwind(AssertUnwindSafe(|| decoder.decode(&frame))) {
            Ok(decoded) => decoded,
            Err(_) => {
                warn!("frame {}: decoder panicked, frame skipped", frame.sequence);
                continue;
            }
        };

        match decoded {
            Ok(symbols) => {
                for symbol in symbols {
                    if !sink.emit(symbol.value, symbol.format) {
                        debug!("Detection receiver dropped, ending decode loop");
                        return handle;
                    }
                }
            }
            Err(failure) if failure.kind == FailureKind::DecodeNoiseTransient => {
                trace!("frame {}: {}", frame.sequence, failure.message);
            }
            Err(failure) => {
                debug!("frame {} decode failed: {}", frame.sequence, failure);
            }
        }
    }

    handle
}
