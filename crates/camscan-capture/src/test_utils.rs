//! Test utilities for capture and engine types
//!
//! Scripted fakes for the capture subsystem, frame decoders and whole engine
//! adapters. Enabled for dependents through the `test-helpers` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, ConstraintCandidate, EngineKind, FacingMode};
use tokio::sync::mpsc;

use crate::adapters::{FrameDecoder, Symbol};
use crate::capture::{CaptureHandle, CaptureSubsystem, Frame};
use crate::device::CameraDevice;
use crate::engine::{AdapterEvent, DetectionSink, EngineAdapter, EngineContainer, Started};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Creates a rear-facing test device
pub fn test_device(id: &str) -> CameraDevice {
    CameraDevice::new(id, "Back Camera").with_facing(FacingMode::Environment)
}

// ─────────────────────────────────────────────────────────
// Hardware probe
// ─────────────────────────────────────────────────────────

/// Counts concurrent holders of the (single) camera
#[derive(Debug, Clone, Default)]
pub struct HardwareProbe {
    held: Arc<AtomicUsize>,
    max_held: Arc<AtomicUsize>,
    acquisitions: Arc<AtomicUsize>,
}

impl HardwareProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self) {
        let now = self.held.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_held.fetch_max(now, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        let _ = self
            .held
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous holders ever observed
    pub fn max_held(&self) -> usize {
        self.max_held.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────
// ScriptedCapture
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CaptureScript {
    devices: Vec<CameraDevice>,
    failures: VecDeque<ScanFailure>,
    always: Option<ScanFailure>,
    candidates: Vec<ConstraintCandidate>,
    frame_tx: Option<mpsc::Sender<Frame>>,
    next_id: u64,
    next_sequence: u64,
    releases: usize,
}

/// In-memory capture subsystem with scripted acquisition outcomes
#[derive(Debug, Clone, Default)]
pub struct ScriptedCapture {
    script: Arc<Mutex<CaptureScript>>,
    probe: HardwareProbe,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::with_devices(vec![test_device("cam-0")])
    }

    pub fn with_devices(devices: Vec<CameraDevice>) -> Self {
        let capture = Self::default();
        lock(&capture.script).devices = devices;
        capture
    }

    /// Fail the next acquisition with `failure`
    pub fn fail_next(&self, failure: ScanFailure) {
        lock(&self.script).failures.push_back(failure);
    }

    /// Fail every acquisition with `failure`
    pub fn fail_always(&self, failure: ScanFailure) {
        lock(&self.script).always = Some(failure);
    }

    /// Feed a frame to the live capture stream; false if none is live
    pub fn push_frame(&self, payload: &str) -> bool {
        let mut script = lock(&self.script);
        let sequence = script.next_sequence;
        script.next_sequence += 1;
        let Some(tx) = script.frame_tx.as_ref() else {
            return false;
        };
        tx.try_send(Frame {
            sequence,
            width: 640,
            height: 480,
            payload: payload.as_bytes().to_vec(),
        })
        .is_ok()
    }

    /// Close the live capture stream as if the device vanished
    pub fn end_stream(&self) {
        lock(&self.script).frame_tx = None;
    }

    pub fn acquire_count(&self) -> usize {
        lock(&self.script).candidates.len()
    }

    pub fn release_count(&self) -> usize {
        lock(&self.script).releases
    }

    pub fn candidates(&self) -> Vec<ConstraintCandidate> {
        lock(&self.script).candidates.clone()
    }

    pub fn held(&self) -> usize {
        self.probe.held()
    }

    pub fn max_held(&self) -> usize {
        self.probe.max_held()
    }
}

impl CaptureSubsystem for ScriptedCapture {
    async fn enumerate_devices(&self) -> std::result::Result<Vec<CameraDevice>, ScanFailure> {
        Ok(lock(&self.script).devices.clone())
    }

    async fn acquire(
        &self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<CaptureHandle, ScanFailure> {
        let mut script = lock(&self.script);
        script.candidates.push(candidate.clone());

        if let Some(failure) = script.failures.pop_front() {
            return Err(failure);
        }
        if let Some(failure) = script.always.clone() {
            return Err(failure);
        }

        let (tx, rx) = mpsc::channel(32);
        script.frame_tx = Some(tx);
        script.next_id += 1;
        self.probe.acquire();
        Ok(CaptureHandle::new(script.next_id, "cam-0", (640, 480), rx))
    }

    async fn release(&self, _handle: CaptureHandle) -> Result<()> {
        let mut script = lock(&self.script);
        script.releases += 1;
        script.frame_tx = None;
        self.probe.release();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// ScriptedDecoder
// ─────────────────────────────────────────────────────────

/// Decodes the whole payload as one symbol of a fixed format
#[derive(Debug, Clone)]
pub struct ScriptedDecoder {
    format: BarcodeFormat,
    fail_configure: bool,
}

impl Default for ScriptedDecoder {
    fn default() -> Self {
        Self::with_format(BarcodeFormat::Code128)
    }
}

impl ScriptedDecoder {
    /// Payload that decodes as frame-level noise
    pub const NOISE: &'static str = "?";
    /// Payload that makes the decoder panic
    pub const PANIC: &'static str = "!!";

    pub fn with_format(format: BarcodeFormat) -> Self {
        Self {
            format,
            fail_configure: false,
        }
    }

    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn configure(&mut self, _formats: &[BarcodeFormat]) -> std::result::Result<(), ScanFailure> {
        if self.fail_configure {
            return Err(ScanFailure::engine_init("scripted decoder refused to configure"));
        }
        Ok(())
    }

    fn decode(&mut self, frame: &Frame) -> std::result::Result<Vec<Symbol>, ScanFailure> {
        match std::str::from_utf8(&frame.payload) {
            Ok("") => Ok(Vec::new()),
            Ok(Self::NOISE) => Err(ScanFailure::decode_noise("blurred frame")),
            Ok(Self::PANIC) => panic!("scripted decoder crashed on frame {}", frame.sequence),
            Ok(value) => Ok(vec![Symbol::new(value, self.format)]),
            Err(_) => Err(ScanFailure::decode_noise("binary payload")),
        }
    }
}

// ─────────────────────────────────────────────────────────
// ScriptedAdapter
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct AdapterScript {
    outcomes: VecDeque<std::result::Result<(), ScanFailure>>,
    always: Option<ScanFailure>,
    prepare_failure: Option<ScanFailure>,
    start_delay: Option<Duration>,
    stop_error: bool,
    sink: Option<DetectionSink>,
    started: Vec<ConstraintCandidate>,
    calls: Vec<String>,
    prepares: usize,
    stops: usize,
    holding: bool,
}

/// Test-side controls and counters for a [`ScriptedAdapter`]
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<AdapterScript>>,
    probe: HardwareProbe,
}

impl ScriptHandle {
    /// Queue outcomes for the next `start` calls, in order
    pub fn push_outcomes(
        &self,
        outcomes: impl IntoIterator<Item = std::result::Result<(), ScanFailure>>,
    ) {
        lock(&self.script).outcomes.extend(outcomes);
    }

    /// Fail every `start` not covered by queued outcomes
    pub fn fail_always(&self, failure: ScanFailure) {
        lock(&self.script).always = Some(failure);
    }

    pub fn fail_prepare(&self, failure: ScanFailure) {
        lock(&self.script).prepare_failure = Some(failure);
    }

    /// Make every `start` wait before resolving
    pub fn set_start_delay(&self, delay: Duration) {
        lock(&self.script).start_delay = Some(delay);
    }

    pub fn fail_stop(&self) {
        lock(&self.script).stop_error = true;
    }

    /// Push a detection as the engine would; false if not running
    pub fn emit(&self, value: &str) -> bool {
        self.emit_format(value, BarcodeFormat::Code128)
    }

    pub fn emit_format(&self, value: &str, format: BarcodeFormat) -> bool {
        let script = lock(&self.script);
        match (&script.sink, script.holding) {
            (Some(sink), true) => sink.emit(value, format),
            _ => false,
        }
    }

    pub fn lose_capture(&self, reason: &str) {
        let script = lock(&self.script);
        if let Some(sink) = &script.sink {
            sink.capture_lost(reason);
        }
    }

    pub fn start_count(&self) -> usize {
        lock(&self.script).started.len()
    }

    pub fn started_candidates(&self) -> Vec<ConstraintCandidate> {
        lock(&self.script).started.clone()
    }

    pub fn prepare_count(&self) -> usize {
        lock(&self.script).prepares
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.script).stops
    }

    /// Ordered log of lifecycle calls (`prepare`, `start`, `stop`)
    pub fn calls(&self) -> Vec<String> {
        lock(&self.script).calls.clone()
    }

    pub fn is_holding(&self) -> bool {
        lock(&self.script).holding
    }

    pub fn probe(&self) -> &HardwareProbe {
        &self.probe
    }
}

/// Engine adapter whose outcomes are scripted from a [`ScriptHandle`]
pub struct ScriptedAdapter {
    kind: EngineKind,
    script: Arc<Mutex<AdapterScript>>,
    probe: HardwareProbe,
}

impl ScriptedAdapter {
    pub fn new(kind: &str) -> (Self, ScriptHandle) {
        Self::with_probe(kind, HardwareProbe::new())
    }

    /// Adapter sharing `probe` with others, to observe cross-engine overlap
    pub fn with_probe(kind: &str, probe: HardwareProbe) -> (Self, ScriptHandle) {
        let script = Arc::new(Mutex::new(AdapterScript::default()));
        let adapter = Self {
            kind: EngineKind::new(kind),
            script: script.clone(),
            probe: probe.clone(),
        };
        (adapter, ScriptHandle { script, probe })
    }

    fn release_hardware(&self, script: &mut AdapterScript) {
        if script.holding {
            script.holding = false;
            self.probe.release();
        }
    }
}

#[async_trait]
impl EngineAdapter for ScriptedAdapter {
    fn kind(&self) -> EngineKind {
        self.kind.clone()
    }

    async fn prepare(
        &mut self,
        container: EngineContainer,
    ) -> std::result::Result<(), ScanFailure> {
        let mut script = lock(&self.script);
        script.calls.push("prepare".into());
        script.prepares += 1;
        self.release_hardware(&mut script);
        if let Some(failure) = script.prepare_failure.clone() {
            return Err(failure);
        }
        script.sink = Some(container.detection_sink());
        Ok(())
    }

    async fn start(
        &mut self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<Started, ScanFailure> {
        let delay = {
            let mut script = lock(&self.script);
            script.calls.push("start".into());
            script.started.push(candidate.clone());
            script.start_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = lock(&self.script);
        let outcome = match script.outcomes.pop_front() {
            Some(outcome) => outcome,
            None => script.always.clone().map_or(Ok(()), Err),
        };
        outcome?;

        self.probe.acquire();
        script.holding = true;
        Ok(Started {
            device_id: candidate.device.device_id().map(str::to_string),
            resolution: candidate
                .resolution
                .map(|r| (r.ideal_width, r.ideal_height)),
        })
    }

    async fn stop(&mut self) -> Result<()> {
        let mut script = lock(&self.script);
        script.calls.push("stop".into());
        script.stops += 1;
        self.release_hardware(&mut script);
        if script.stop_error {
            return Err(Error::engine("scripted stop failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;

    #[test]
    fn test_device_is_rear() {
        let device = test_device("cam-7");
        assert_eq!(device.id, "cam-7");
        assert!(device.is_facing(FacingMode::Environment));
    }

    #[tokio::test]
    async fn test_scripted_adapter_outcomes_in_order() {
        let (mut adapter, handle) = ScriptedAdapter::new("zbar");
        handle.push_outcomes([Err(ScanFailure::busy("busy")), Ok(())]);
        let (tx, _rx) = mpsc::channel(4);
        adapter
            .prepare(EngineContainer::new(tx, EngineOptions::default()))
            .await
            .unwrap();

        let candidate = ConstraintCandidate::minimal(FacingMode::Environment);
        assert!(adapter.start(&candidate).await.is_err());
        assert!(!handle.is_holding());
        assert!(adapter.start(&candidate).await.is_ok());
        assert!(handle.is_holding());

        adapter.stop().await.unwrap();
        assert_eq!(handle.probe().held(), 0);
        assert_eq!(handle.calls(), vec!["prepare", "start", "start", "stop"]);
    }

    #[tokio::test]
    async fn test_probe_tracks_overlap() {
        let probe = HardwareProbe::new();
        let (mut a, _ha) = ScriptedAdapter::with_probe("a", probe.clone());
        let (mut b, _hb) = ScriptedAdapter::with_probe("b", probe.clone());
        let candidate = ConstraintCandidate::minimal(FacingMode::Environment);

        a.start(&candidate).await.unwrap();
        b.start(&candidate).await.unwrap();
        assert_eq!(probe.max_held(), 2);

        a.stop().await.unwrap();
        b.stop().await.unwrap();
        assert_eq!(probe.held(), 0);
    }
}
