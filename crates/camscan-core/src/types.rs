//! Core domain type definitions

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ─────────────────────────────────────────────────────────
// Quality & Focus
// ─────────────────────────────────────────────────────────

/// Requested capture quality tier.
///
/// Mapped to concrete resolution bounds by [`crate::CapabilityCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityProfile {
    Low,
    Standard,
    #[default]
    High,
    Ultra,
}

impl QualityProfile {
    pub const ALL: [QualityProfile; 4] = [
        QualityProfile::Low,
        QualityProfile::Standard,
        QualityProfile::High,
        QualityProfile::Ultra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityProfile::Low => "low",
            QualityProfile::Standard => "standard",
            QualityProfile::High => "high",
            QualityProfile::Ultra => "ultra",
        }
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityProfile {
    type Err = Error;

    /// Accepts tier names as well as the common marketing labels
    /// (`sd`, `hd`, `fhd`, `4k`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "sd" => Ok(QualityProfile::Low),
            "standard" | "hd" | "720p" => Ok(QualityProfile::Standard),
            "high" | "fhd" | "1080p" => Ok(QualityProfile::High),
            "ultra" | "4k" | "2160p" => Ok(QualityProfile::Ultra),
            other => Err(Error::config_invalid(format!(
                "unknown quality profile '{}'",
                other
            ))),
        }
    }
}

/// Camera focus hint.
///
/// Absence of a hint (`Option::None`) leaves focus to the device default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    Continuous,
    SingleShot,
    Manual,
    Macro,
}

impl FocusMode {
    pub const ALL: [FocusMode; 4] = [
        FocusMode::Continuous,
        FocusMode::SingleShot,
        FocusMode::Manual,
        FocusMode::Macro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusMode::Continuous => "continuous",
            FocusMode::SingleShot => "single-shot",
            FocusMode::Manual => "manual",
            FocusMode::Macro => "macro",
        }
    }
}

impl fmt::Display for FocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FocusMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(FocusMode::Continuous),
            "single-shot" | "single_shot" | "singleshot" => Ok(FocusMode::SingleShot),
            "manual" => Ok(FocusMode::Manual),
            "macro" => Ok(FocusMode::Macro),
            other => Err(Error::config_invalid(format!("unknown focus mode '{}'", other))),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Device Selection
// ─────────────────────────────────────────────────────────

/// Which way the camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointing away from the operator
    #[default]
    Environment,
    /// Front camera
    User,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "environment" | "rear" | "back" => Ok(FacingMode::Environment),
            "user" | "front" => Ok(FacingMode::User),
            other => Err(Error::config_invalid(format!("unknown facing mode '{}'", other))),
        }
    }
}

/// Device part of an acquisition request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceSelector {
    /// A specific device, with the facing used once the id is relaxed away
    Exact { device_id: String, facing: FacingMode },
    /// Any device pointing the given way
    Facing { facing: FacingMode },
}

impl DeviceSelector {
    pub fn exact(device_id: impl Into<String>, facing: FacingMode) -> Self {
        Self::Exact {
            device_id: device_id.into(),
            facing,
        }
    }

    pub fn facing(facing: FacingMode) -> Self {
        Self::Facing { facing }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            DeviceSelector::Exact { device_id, .. } => Some(device_id),
            DeviceSelector::Facing { .. } => None,
        }
    }

    pub fn facing_mode(&self) -> FacingMode {
        match self {
            DeviceSelector::Exact { facing, .. } | DeviceSelector::Facing { facing } => *facing,
        }
    }

    /// The directional-hint-only form of this selector
    pub fn relaxed(&self) -> Self {
        Self::facing(self.facing_mode())
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::facing(FacingMode::Environment)
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Exact { device_id, .. } => write!(f, "device:{}", device_id),
            DeviceSelector::Facing { facing } => write!(f, "facing:{}", facing),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Acquisition Requests
// ─────────────────────────────────────────────────────────

/// Min/ideal resolution pair for one quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ResolutionBounds {
    pub min_width: u32,
    pub ideal_width: u32,
    pub min_height: u32,
    pub ideal_height: u32,
}

impl ResolutionBounds {
    pub const fn new(min_width: u32, ideal_width: u32, min_height: u32, ideal_height: u32) -> Self {
        Self {
            min_width,
            ideal_width,
            min_height,
            ideal_height,
        }
    }
}

impl fmt::Display for ResolutionBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} (min {}x{})",
            self.ideal_width, self.ideal_height, self.min_width, self.min_height
        )
    }
}

/// One fully specified camera-acquisition request.
///
/// Produced in order by [`crate::negotiate::build_chain`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ConstraintCandidate {
    pub device: DeviceSelector,
    pub resolution: Option<ResolutionBounds>,
    pub frame_rate: Option<u32>,
    pub focus: Option<FocusMode>,
}

impl ConstraintCandidate {
    /// Directional hint only: no resolution, frame rate or focus constraints
    pub fn minimal(facing: FacingMode) -> Self {
        Self {
            device: DeviceSelector::facing(facing),
            resolution: None,
            frame_rate: None,
            focus: None,
        }
    }

    pub fn is_minimal(&self) -> bool {
        matches!(self.device, DeviceSelector::Facing { .. })
            && self.resolution.is_none()
            && self.frame_rate.is_none()
            && self.focus.is_none()
    }
}

impl fmt::Display for ConstraintCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.device)?;
        if let Some(res) = &self.resolution {
            write!(f, " {}", res)?;
        }
        if let Some(fps) = self.frame_rate {
            write!(f, " @{}fps", fps)?;
        }
        if let Some(focus) = self.focus {
            write!(f, " focus={}", focus)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Detections
// ─────────────────────────────────────────────────────────

/// Barcode symbology reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    Code128,
    Code39,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Itf,
    Codabar,
    QrCode,
    DataMatrix,
    Pdf417,
    Aztec,
}

impl BarcodeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::Code128 => "code128",
            BarcodeFormat::Code39 => "code39",
            BarcodeFormat::Ean13 => "ean13",
            BarcodeFormat::Ean8 => "ean8",
            BarcodeFormat::UpcA => "upc_a",
            BarcodeFormat::UpcE => "upc_e",
            BarcodeFormat::Itf => "itf",
            BarcodeFormat::Codabar => "codabar",
            BarcodeFormat::QrCode => "qr_code",
            BarcodeFormat::DataMatrix => "data_matrix",
            BarcodeFormat::Pdf417 => "pdf417",
            BarcodeFormat::Aztec => "aztec",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarcodeFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let format = match normalized.as_str() {
            "code128" | "code_128" => BarcodeFormat::Code128,
            "code39" | "code_39" => BarcodeFormat::Code39,
            "ean13" | "ean_13" => BarcodeFormat::Ean13,
            "ean8" | "ean_8" => BarcodeFormat::Ean8,
            "upc_a" | "upca" => BarcodeFormat::UpcA,
            "upc_e" | "upce" => BarcodeFormat::UpcE,
            "itf" => BarcodeFormat::Itf,
            "codabar" => BarcodeFormat::Codabar,
            "qr_code" | "qr" | "qrcode" => BarcodeFormat::QrCode,
            "data_matrix" | "datamatrix" => BarcodeFormat::DataMatrix,
            "pdf417" | "pdf_417" => BarcodeFormat::Pdf417,
            "aztec" => BarcodeFormat::Aztec,
            other => {
                return Err(Error::config_invalid(format!(
                    "unknown barcode format '{}'",
                    other
                )))
            }
        };
        Ok(format)
    }
}

/// A single raw detection from an engine adapter.
///
/// Transient value object: consumed once by the debouncer, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    pub value: String,
    pub format: BarcodeFormat,
    pub timestamp: Instant,
}

impl DetectionEvent {
    pub fn new(value: impl Into<String>, format: BarcodeFormat, timestamp: Instant) -> Self {
        Self {
            value: value.into(),
            format,
            timestamp,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Engines & Session State
// ─────────────────────────────────────────────────────────

/// Identifier of a pluggable decode back-end (e.g. `"zbar"`, `"html5-qrcode"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EngineKind(String);

impl EngineKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineKind {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EngineKind {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Lifecycle state of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session; initial and terminal
    #[default]
    Idle,
    /// Building the candidate chain
    Negotiating,
    /// Preparing the engine and starting capture for the current candidate
    Acquiring,
    /// Waiting out the backoff before re-trying the same candidate
    RetryingAcquire,
    /// Capture is live and detections are flowing
    Running,
    /// Tearing down engine and capture resources
    Stopping,
    /// Start failed after exhausting recovery; terminal but not sticky
    Failed,
}

impl SessionState {
    /// Idle and Failed are terminal; everything else holds (or is acquiring) hardware
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Negotiating => "negotiating",
            SessionState::Acquiring => "acquiring",
            SessionState::RetryingAcquire => "retrying_acquire",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_profile_aliases() {
        assert_eq!("fhd".parse::<QualityProfile>().unwrap(), QualityProfile::High);
        assert_eq!("HD".parse::<QualityProfile>().unwrap(), QualityProfile::Standard);
        assert_eq!("4k".parse::<QualityProfile>().unwrap(), QualityProfile::Ultra);
        assert_eq!("sd".parse::<QualityProfile>().unwrap(), QualityProfile::Low);
        assert!("8k".parse::<QualityProfile>().is_err());
    }

    #[test]
    fn test_focus_mode_serde_names() {
        let json = serde_json::to_string(&FocusMode::SingleShot).unwrap();
        assert_eq!(json, "\"single-shot\"");
        assert_eq!("single-shot".parse::<FocusMode>().unwrap(), FocusMode::SingleShot);
    }

    #[test]
    fn test_device_selector_relaxed_keeps_facing() {
        let selector = DeviceSelector::exact("cam-1", FacingMode::User);
        assert_eq!(selector.device_id(), Some("cam-1"));
        assert_eq!(selector.relaxed(), DeviceSelector::facing(FacingMode::User));
        assert_eq!(selector.relaxed().device_id(), None);
    }

    #[test]
    fn test_minimal_candidate() {
        let candidate = ConstraintCandidate::minimal(FacingMode::Environment);
        assert!(candidate.is_minimal());
        assert_eq!(candidate.to_string(), "facing:environment");
    }

    #[test]
    fn test_candidate_display_includes_constraints() {
        let candidate = ConstraintCandidate {
            device: DeviceSelector::exact("cam-0", FacingMode::Environment),
            resolution: Some(ResolutionBounds::new(1080, 1920, 720, 1080)),
            frame_rate: Some(30),
            focus: Some(FocusMode::Continuous),
        };
        let text = candidate.to_string();
        assert!(text.contains("device:cam-0"));
        assert!(text.contains("1920x1080"));
        assert!(text.contains("focus=continuous"));
        assert!(!candidate.is_minimal());
    }

    #[test]
    fn test_barcode_format_parsing() {
        assert_eq!("code_128".parse::<BarcodeFormat>().unwrap(), BarcodeFormat::Code128);
        assert_eq!("QR".parse::<BarcodeFormat>().unwrap(), BarcodeFormat::QrCode);
        assert_eq!("ean-13".parse::<BarcodeFormat>().unwrap(), BarcodeFormat::Ean13);
        assert!("morse".parse::<BarcodeFormat>().is_err());
    }

    #[test]
    fn test_session_state_terminal() {
        assert!(SessionState::Idle.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        for state in [
            SessionState::Negotiating,
            SessionState::Acquiring,
            SessionState::RetryingAcquire,
            SessionState::Running,
            SessionState::Stopping,
        ] {
            assert!(state.is_active(), "{} should be active", state);
        }
    }

    #[test]
    fn test_engine_kind_transparent_serde() {
        let kind = EngineKind::new("zbar");
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"zbar\"");
        let parsed: EngineKind = serde_json::from_str("\"html5-qrcode\"").unwrap();
        assert_eq!(parsed.as_str(), "html5-qrcode");
    }
}
