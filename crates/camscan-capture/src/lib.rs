//! # camscan-capture - Capture Subsystem & Engine Adapters
//!
//! The hardware-facing half of camscan: device enumeration, camera
//! acquisition, and the adapters that normalize each decode engine's
//! lifecycle into one contract.
//!
//! Depends on [`camscan_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Devices & Capture
//! - [`CameraDevice`] - Selectable camera with label-inferred facing
//! - [`DeviceCapabilities`] - Resolution ceiling, frame rate and focus modes
//! - [`pick_default_device()`] - Rear-camera-first default selection
//! - [`CaptureSubsystem`] - Enumerate, acquire and release capture streams
//! - [`CaptureHandle`], [`Frame`] - A live capture stream and its frames
//!
//! ### Engine Adapters
//! - [`EngineAdapter`] - Uniform prepare/start/stop contract
//! - [`AdapterEvent`] - Detections and capture loss pushed while running
//! - [`FramePullAdapter`], [`CallbackAdapter`], [`ManagedAdapter`] - The three adapter variants
//!
//! ### Replay
//! - [`ReplayCamera`] - Fixture-driven virtual camera
//! - [`replay_adapters()`] - One replay-backed adapter per known engine

pub mod adapters;
pub mod capture;
pub mod device;
pub mod engine;
pub mod replay;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use adapters::{
    CallbackAdapter, CallbackEngine, DecodeCallbacks, FrameDecoder, FramePullAdapter,
    ManagedAdapter, ManagedEngine, Symbol,
};
pub use capture::{CaptureHandle, CaptureSubsystem, Frame};
pub use device::{
    find_device, infer_facing, pick_default_device, CameraDevice, DeviceCapabilities,
};
pub use engine::{
    AdapterEvent, DetectionSink, EngineAdapter, EngineContainer, EngineOptions, Started,
    DEFAULT_SCAN_INTERVAL,
};
pub use replay::{replay_adapters, ReplayCamera, ReplayFixture};
