//! Device/capture subsystem boundary
//!
//! The capture subsystem is the single owner of camera hardware. Engines ask
//! it for a [`CaptureHandle`] matching a [`ConstraintCandidate`] and hand the
//! handle back through [`CaptureSubsystem::release`] when done.

use camscan_core::prelude::*;
use camscan_core::ConstraintCandidate;
use tokio::sync::mpsc;

use crate::device::CameraDevice;

/// One captured frame. Pixel content is opaque to everything but a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub payload: Vec<u8>,
}

/// A live capture stream bound to one device
#[derive(Debug)]
pub struct CaptureHandle {
    id: u64,
    device_id: String,
    width: u32,
    height: u32,
    frames: mpsc::Receiver<Frame>,
}

impl CaptureHandle {
    pub fn new(
        id: u64,
        device_id: impl Into<String>,
        (width, height): (u32, u32),
        frames: mpsc::Receiver<Frame>,
    ) -> Self {
        Self {
            id,
            device_id: device_id.into(),
            width,
            height,
            frames,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Wait for the next frame; `None` once the stream has ended
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }
}

/// Camera capability enumeration and resource acquisition
///
/// Implementations must be cancel-safe in `acquire`: dropping the future
/// before it resolves leaves no resource held.
#[trait_variant::make(CaptureSubsystem: Send)]
pub trait LocalCaptureSubsystem {
    /// List selectable devices
    async fn enumerate_devices(&self) -> std::result::Result<Vec<CameraDevice>, ScanFailure>;

    /// Acquire a capture stream satisfying `candidate`
    async fn acquire(
        &self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<CaptureHandle, ScanFailure>;

    /// Release a previously acquired stream
    async fn release(&self, handle: CaptureHandle) -> Result<()>;
}
