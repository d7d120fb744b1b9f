//! Replay-backed engines for every adapter variant

use std::panic::{catch_unwind, AssertUnwindSafe};

use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, ConstraintCandidate};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{FixtureSymbol, ReplayCamera};
use crate::adapters::{
    CallbackAdapter, CallbackEngine, DecodeCallbacks, FrameDecoder, FramePullAdapter,
    ManagedAdapter, ManagedEngine, Symbol,
};
use crate::capture::{CaptureHandle, CaptureSubsystem, Frame};
use crate::engine::{DetectionSink, EngineAdapter, Started};

/// Frame-pull engines
pub const FRAME_PULL_ENGINES: [&str; 2] = ["zbar", "barcode-detector"];
/// Push-callback engines
pub const CALLBACK_ENGINES: [&str; 3] = ["html5-qrcode", "zxing", "quagga"];
/// Managed engines
pub const MANAGED_ENGINES: [&str; 1] = ["scandit"];

/// One adapter per known engine kind, all sharing `camera`
pub fn replay_adapters(camera: &ReplayCamera) -> Vec<Box<dyn EngineAdapter>> {
    let mut adapters: Vec<Box<dyn EngineAdapter>> = Vec::new();

    for kind in FRAME_PULL_ENGINES {
        let decoder = PayloadDecoder {
            fail_init: camera.engine_fails(kind),
        };
        adapters.push(Box::new(FramePullAdapter::new(kind, camera.clone(), decoder)));
    }
    for kind in CALLBACK_ENGINES {
        adapters.push(Box::new(CallbackAdapter::new(
            kind,
            ReplayPushEngine::new(kind, camera.clone()),
        )));
    }
    for kind in MANAGED_ENGINES {
        adapters.push(Box::new(ManagedAdapter::new(
            kind,
            ReplayManagedEngine::new(kind, camera.clone()),
        )));
    }

    adapters
}

// ─────────────────────────────────────────────────────────
// Payload codec
// ─────────────────────────────────────────────────────────

/// Decoder for replay frames. A payload is one `format:value` line per symbol.
#[derive(Debug, Clone, Default)]
pub struct PayloadDecoder {
    fail_init: bool,
}

impl PayloadDecoder {
    pub(super) fn encode(symbols: &[FixtureSymbol]) -> Vec<u8> {
        symbols
            .iter()
            .map(|s| format!("{}:{}", s.format, s.value))
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    pub fn decode_payload(payload: &[u8]) -> std::result::Result<Vec<Symbol>, ScanFailure> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| ScanFailure::decode_noise("frame payload is not text"))?;

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (format, value) = line
                    .split_once(':')
                    .ok_or_else(|| ScanFailure::decode_noise(format!("unreadable symbol '{}'", line)))?;
                let format: BarcodeFormat = format
                    .parse()
                    .map_err(|_| ScanFailure::decode_noise(format!("unknown symbology '{}'", format)))?;
                Ok(Symbol::new(value, format))
            })
            .collect()
    }
}

impl FrameDecoder for PayloadDecoder {
    fn configure(&mut self, _formats: &[BarcodeFormat]) -> std::result::Result<(), ScanFailure> {
        if self.fail_init {
            return Err(ScanFailure::engine_init("decoder failed to initialize"));
        }
        Ok(())
    }

    fn decode(&mut self, frame: &Frame) -> std::result::Result<Vec<Symbol>, ScanFailure> {
        Self::decode_payload(&frame.payload)
    }
}

// ─────────────────────────────────────────────────────────
// Engine-paced frame task
// ─────────────────────────────────────────────────────────

/// Decodes every frame as it arrives; used by engines that drive their own camera
struct FrameTask {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<CaptureHandle>,
}

impl FrameTask {
    fn spawn<F, L>(mut handle: CaptureHandle, on_symbol: F, on_lost: L) -> Self
    where
        F: Fn(Symbol) -> bool + Send + 'static,
        L: FnOnce(String) + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    frame = handle.next_frame() => frame,
                };
                let Some(frame) = frame else {
                    on_lost(format!("capture stream on {} ended", handle.device_id()));
                    break;
                };
                let symbols = match PayloadDecoder::decode_payload(&frame.payload) {
                    Ok(symbols) => symbols,
                    Err(failure) => {
                        trace!("frame {}: {}", frame.sequence, failure.message);
                        continue;
                    }
                };
                // Callbacks belong to the host; a panic there must not strand the handle
                match catch_unwind(AssertUnwindSafe(|| symbols.into_iter().all(&on_symbol))) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(_) => warn!("frame {}: detection callback panicked", frame.sequence),
                }
            }
            handle
        });
        Self { shutdown_tx, task }
    }

    async fn finish(self) -> Result<CaptureHandle> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| Error::capture(format!("frame task ended abnormally: {}", e)))
    }
}

// ─────────────────────────────────────────────────────────
// Push-callback engine
// ─────────────────────────────────────────────────────────

/// Replay engine that owns its camera and reports through callbacks
pub struct ReplayPushEngine {
    kind: String,
    camera: ReplayCamera,
    initialized: bool,
    scanning: Option<FrameTask>,
}

impl ReplayPushEngine {
    pub fn new(kind: impl Into<String>, camera: ReplayCamera) -> Self {
        Self {
            kind: kind.into(),
            camera,
            initialized: false,
            scanning: None,
        }
    }
}

impl CallbackEngine for ReplayPushEngine {
    async fn init(&mut self, _formats: &[BarcodeFormat]) -> std::result::Result<(), ScanFailure> {
        if self.camera.engine_fails(&self.kind) {
            return Err(ScanFailure::engine_init(format!(
                "{} failed to initialize",
                self.kind
            )));
        }
        self.initialized = true;
        Ok(())
    }

    async fn start_scanning(
        &mut self,
        candidate: &ConstraintCandidate,
        callbacks: DecodeCallbacks,
    ) -> std::result::Result<Started, ScanFailure> {
        if !self.initialized {
            return Err(ScanFailure::engine_init(format!("{} not initialized", self.kind)));
        }

        let handle = self.camera.acquire(candidate).await?;
        let started = Started {
            device_id: Some(handle.device_id().to_string()),
            resolution: Some(handle.resolution()),
        };

        let lost = callbacks.clone();
        self.scanning = Some(FrameTask::spawn(
            handle,
            move |symbol| {
                callbacks.decoded(symbol.value, symbol.format);
                true
            },
            move |reason| lost.capture_lost(reason),
        ));
        Ok(started)
    }

    fn is_scanning(&self) -> bool {
        self.scanning.is_some()
    }

    async fn stop_scanning(&mut self) -> Result<()> {
        let Some(task) = self.scanning.take() else {
            return Ok(());
        };
        let handle = task.finish().await?;
        self.camera.release(handle).await
    }

    async fn clear(&mut self) -> Result<()> {
        let result = self.stop_scanning().await;
        self.initialized = false;
        result
    }
}

// ─────────────────────────────────────────────────────────
// Managed engine
// ─────────────────────────────────────────────────────────

/// Replay engine with a staged context/camera/capture lifecycle
pub struct ReplayManagedEngine {
    kind: String,
    camera: ReplayCamera,
    context: bool,
    handle: Option<CaptureHandle>,
    capturing: Option<FrameTask>,
}

impl ReplayManagedEngine {
    pub fn new(kind: impl Into<String>, camera: ReplayCamera) -> Self {
        Self {
            kind: kind.into(),
            camera,
            context: false,
            handle: None,
            capturing: None,
        }
    }
}

impl ManagedEngine for ReplayManagedEngine {
    async fn create_context(
        &mut self,
        _formats: &[BarcodeFormat],
    ) -> std::result::Result<(), ScanFailure> {
        if self.camera.engine_fails(&self.kind) {
            return Err(ScanFailure::engine_init(format!(
                "{} context creation failed",
                self.kind
            )));
        }
        self.context = true;
        Ok(())
    }

    async fn camera_on(
        &mut self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<Started, ScanFailure> {
        if !self.context {
            return Err(ScanFailure::engine_init("no data capture context"));
        }
        let handle = self.camera.acquire(candidate).await?;
        let started = Started {
            device_id: Some(handle.device_id().to_string()),
            resolution: Some(handle.resolution()),
        };
        self.handle = Some(handle);
        Ok(started)
    }

    async fn enable_capture(&mut self, sink: DetectionSink) -> std::result::Result<(), ScanFailure> {
        let Some(handle) = self.handle.take() else {
            return Err(ScanFailure::device_not_found("camera is off"));
        };
        let lost = sink.clone();
        self.capturing = Some(FrameTask::spawn(
            handle,
            move |symbol| sink.emit(symbol.value, symbol.format),
            move |reason| lost.capture_lost(reason),
        ));
        Ok(())
    }

    async fn disable_capture(&mut self) -> Result<()> {
        if let Some(task) = self.capturing.take() {
            self.handle = Some(task.finish().await?);
        }
        Ok(())
    }

    async fn camera_off(&mut self) -> Result<()> {
        self.disable_capture().await?;
        match self.handle.take() {
            Some(handle) => self.camera.release(handle).await,
            None => Ok(()),
        }
    }

    async fn dispose(&mut self) -> Result<()> {
        self.context = false;
        Ok(())
    }
}
