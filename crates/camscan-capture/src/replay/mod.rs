//! Replay virtual camera
//!
//! A [`CaptureSubsystem`] driven by a TOML fixture instead of hardware. The
//! fixture lists devices with their capability ceilings, the frames every
//! capture stream plays back, and faults to inject into acquisition.
//!
//! ```toml
//! [[devices]]
//! id = "cam-rear"
//! label = "Back Camera"
//! max_width = 1280
//! max_height = 720
//!
//! [[frames]]
//! symbols = [{ format = "code128", value = "ABC-123" }]
//! repeat = 10
//!
//! [playback]
//! frame_interval_ms = 33
//! settle_ms = 200
//!
//! [faults]
//! busy_attempts = 2
//! ```

mod engines;

pub use engines::{
    replay_adapters, PayloadDecoder, ReplayManagedEngine, ReplayPushEngine, CALLBACK_ENGINES,
    FRAME_PULL_ENGINES, MANAGED_ENGINES,
};

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, ConstraintCandidate, DeviceSelector, FacingMode, FocusMode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::capture::{CaptureHandle, CaptureSubsystem, Frame};
use crate::device::{CameraDevice, DeviceCapabilities};

const FRAME_BUFFER: usize = 8;

// ─────────────────────────────────────────────────────────
// Fixture
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayFixture {
    #[serde(default)]
    pub devices: Vec<FixtureDevice>,

    #[serde(default)]
    pub frames: Vec<FixtureFrame>,

    #[serde(default)]
    pub playback: Playback,

    #[serde(default)]
    pub faults: Faults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDevice {
    pub id: String,

    #[serde(default)]
    pub label: String,

    /// Overrides label-based inference
    #[serde(default)]
    pub facing: Option<FacingMode>,

    #[serde(default = "default_max_width")]
    pub max_width: u32,

    #[serde(default = "default_max_height")]
    pub max_height: u32,

    #[serde(default = "default_max_frame_rate")]
    pub max_frame_rate: u32,

    /// Supported focus modes; all when omitted
    #[serde(default)]
    pub focus_modes: Option<Vec<FocusMode>>,
}

fn default_max_width() -> u32 {
    1920
}

fn default_max_height() -> u32 {
    1080
}

fn default_max_frame_rate() -> u32 {
    30
}

impl FixtureDevice {
    fn camera_device(&self) -> CameraDevice {
        let device = CameraDevice::new(self.id.clone(), self.label.clone()).with_capabilities(
            DeviceCapabilities {
                max_width: self.max_width,
                max_height: self.max_height,
                max_frame_rate: self.max_frame_rate,
                focus_modes: self
                    .focus_modes
                    .clone()
                    .unwrap_or_else(|| FocusMode::ALL.to_vec()),
            },
        );
        match self.facing {
            Some(facing) => device.with_facing(facing),
            None => device,
        }
    }

    fn supports_focus(&self, focus: FocusMode) -> bool {
        self.focus_modes
            .as_ref()
            .map_or(true, |modes| modes.contains(&focus))
    }

    /// Check `candidate` against this device's ceilings, returning the
    /// negotiated resolution
    fn negotiate(
        &self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<(u32, u32), ScanFailure> {
        let Some(bounds) = candidate.resolution else {
            return Ok((self.max_width, self.max_height));
        };

        if bounds.min_width > self.max_width || bounds.min_height > self.max_height {
            return Err(ScanFailure::constraint_rejected(format!(
                "{} cannot deliver {} (max {}x{})",
                self.id, bounds, self.max_width, self.max_height
            )));
        }
        if let Some(fps) = candidate.frame_rate {
            if fps > self.max_frame_rate {
                return Err(ScanFailure::constraint_rejected(format!(
                    "{} cannot deliver {}fps (max {})",
                    self.id, fps, self.max_frame_rate
                )));
            }
        }
        if let Some(focus) = candidate.focus {
            if !self.supports_focus(focus) {
                return Err(ScanFailure::constraint_rejected(format!(
                    "{} does not support {} focus",
                    self.id, focus
                )));
            }
        }

        Ok((
            bounds.ideal_width.min(self.max_width),
            bounds.ideal_height.min(self.max_height),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureFrame {
    #[serde(default)]
    pub symbols: Vec<FixtureSymbol>,

    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSymbol {
    pub format: BarcodeFormat,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Playback {
    pub frame_interval_ms: u64,
    /// Restart from the first frame instead of ending the stream
    #[serde(rename = "loop")]
    pub looped: bool,
    /// Simulated acquisition latency
    pub acquire_delay_ms: u64,
    /// How long the device stays busy after a release
    pub settle_ms: u64,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33,
            looped: false,
            acquire_delay_ms: 0,
            settle_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Faults {
    /// The first N acquisitions report the device as busy
    pub busy_attempts: u32,
    pub permission_denied: bool,
    /// Engine kinds whose initialization fails
    pub failing_engines: Vec<String>,
}

impl ReplayFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read replay fixture {}", path.display())
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let fixture: ReplayFixture = toml::from_str(content)?;
        for device in &fixture.devices {
            if device.id.is_empty() {
                return Err(Error::replay("device with empty id"));
            }
        }
        Ok(fixture)
    }

    /// Encode the fixture frames into opaque payloads, one entry per repeat
    fn encoded_frames(&self, (width, height): (u32, u32)) -> Vec<Frame> {
        let mut sequence = 0;
        let mut frames = Vec::new();
        for frame in &self.frames {
            let payload = PayloadDecoder::encode(&frame.symbols);
            for _ in 0..frame.repeat {
                frames.push(Frame {
                    sequence,
                    width,
                    height,
                    payload: payload.clone(),
                });
                sequence += 1;
            }
        }
        frames
    }
}

// ─────────────────────────────────────────────────────────
// Camera
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CameraState {
    held_by: Option<u64>,
    busy_until: Option<Instant>,
    busy_remaining: u32,
    acquire_attempts: u32,
}

#[derive(Debug)]
struct ReplayInner {
    fixture: ReplayFixture,
    state: Mutex<CameraState>,
    next_handle: AtomicU64,
}

/// Shared virtual camera. Clones refer to the same device state.
#[derive(Debug, Clone)]
pub struct ReplayCamera {
    inner: Arc<ReplayInner>,
}

impl ReplayCamera {
    pub fn new(fixture: ReplayFixture) -> Self {
        let state = CameraState {
            busy_remaining: fixture.faults.busy_attempts,
            ..Default::default()
        };
        Self {
            inner: Arc::new(ReplayInner {
                fixture,
                state: Mutex::new(state),
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ReplayFixture::load(path)?))
    }

    pub fn fixture(&self) -> &ReplayFixture {
        &self.inner.fixture
    }

    pub fn devices(&self) -> Vec<CameraDevice> {
        self.inner
            .fixture
            .devices
            .iter()
            .map(FixtureDevice::camera_device)
            .collect()
    }

    /// Total acquisition attempts seen, successful or not
    pub fn acquire_attempts(&self) -> u32 {
        self.state().acquire_attempts
    }

    pub fn is_held(&self) -> bool {
        self.state().held_by.is_some()
    }

    pub fn engine_fails(&self, kind: &str) -> bool {
        self.inner
            .fixture
            .faults
            .failing_engines
            .iter()
            .any(|k| k == kind)
    }

    fn state(&self) -> MutexGuard<'_, CameraState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn resolve_device(
        &self,
        selector: &DeviceSelector,
    ) -> std::result::Result<&FixtureDevice, ScanFailure> {
        let devices = &self.inner.fixture.devices;
        match selector {
            DeviceSelector::Exact { device_id, .. } => devices
                .iter()
                .find(|d| &d.id == device_id)
                .ok_or_else(|| ScanFailure::device_not_found(format!("no camera '{}'", device_id))),
            DeviceSelector::Facing { facing } => devices
                .iter()
                .find(|d| d.camera_device().is_facing(*facing))
                .or_else(|| devices.first())
                .ok_or_else(|| ScanFailure::device_not_found("no cameras available")),
        }
    }

    /// Synchronous part of acquisition; no await while the state lock is held
    fn try_acquire(
        &self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<(u64, String, (u32, u32)), ScanFailure> {
        let mut state = self.state();
        state.acquire_attempts += 1;

        if self.inner.fixture.faults.permission_denied {
            return Err(ScanFailure::permission_denied("camera permission denied"));
        }

        let device = self.resolve_device(&candidate.device)?;

        if state.held_by.is_some() {
            return Err(ScanFailure::busy(format!("{} is already in use", device.id)));
        }
        if let Some(until) = state.busy_until {
            if Instant::now() < until {
                return Err(ScanFailure::busy(format!("{} is still releasing", device.id)));
            }
            state.busy_until = None;
        }
        if state.busy_remaining > 0 {
            state.busy_remaining -= 1;
            return Err(ScanFailure::busy(format!(
                "{} is already under transition",
                device.id
            )));
        }

        let resolution = device.negotiate(candidate)?;
        let id = self.inner.next_handle.fetch_add(1, Ordering::Relaxed);
        state.held_by = Some(id);
        Ok((id, device.id.clone(), resolution))
    }
}

impl CaptureSubsystem for ReplayCamera {
    async fn enumerate_devices(&self) -> std::result::Result<Vec<CameraDevice>, ScanFailure> {
        Ok(self.devices())
    }

    async fn acquire(
        &self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<CaptureHandle, ScanFailure> {
        let delay = self.inner.fixture.playback.acquire_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let (id, device_id, resolution) = self.try_acquire(candidate)?;
        debug!(
            "replay: handle {} on {} at {}x{}",
            id, device_id, resolution.0, resolution.1
        );

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let playback = self.inner.fixture.playback.clone();
        tokio::spawn(play_frames(
            self.inner.fixture.encoded_frames(resolution),
            playback,
            tx,
        ));

        Ok(CaptureHandle::new(id, device_id, resolution, rx))
    }

    async fn release(&self, handle: CaptureHandle) -> Result<()> {
        let mut state = self.state();
        if state.held_by != Some(handle.id()) {
            return Err(Error::capture(format!(
                "handle {} is not the active capture",
                handle.id()
            )));
        }

        state.held_by = None;
        let settle = self.inner.fixture.playback.settle_ms;
        if settle > 0 {
            state.busy_until = Some(Instant::now() + Duration::from_millis(settle));
        }
        debug!("replay: released handle {}", handle.id());
        Ok(())
    }
}

async fn play_frames(frames: Vec<Frame>, playback: Playback, tx: mpsc::Sender<Frame>) {
    if frames.is_empty() {
        // Live but empty stream until the handle is dropped
        tx.closed().await;
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(playback.frame_interval_ms.max(1)));
    loop {
        for frame in &frames {
            ticker.tick().await;
            if tx.send(frame.clone()).await.is_err() {
                return;
            }
        }
        if !playback.looped {
            return;
        }
    }
}
