//! Camera device descriptions and default-device selection

use std::sync::LazyLock;

use camscan_core::{DeviceSelector, FacingMode, FocusMode};
use regex::Regex;
use serde::{Deserialize, Serialize};

static REAR_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(back|rear|environment|arrière)\b").expect("Invalid rear label regex")
});

static FRONT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(front|user|facetime)\b").expect("Invalid front label regex")
});

/// A selectable camera as reported by capability enumeration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CameraDevice {
    /// Platform device identifier
    pub id: String,

    /// Human-readable label (may be empty before permission is granted)
    pub label: String,

    /// Facing direction, inferred from the label when the platform omits it
    #[serde(default)]
    pub facing: Option<FacingMode>,

    /// What the device can deliver, when the platform reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<DeviceCapabilities>,
}

/// Resolution ceiling, frame rate and focus modes of one camera
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceCapabilities {
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
    #[serde(default)]
    pub focus_modes: Vec<FocusMode>,
}

impl DeviceCapabilities {
    pub fn supports_focus(&self, focus: FocusMode) -> bool {
        self.focus_modes.contains(&focus)
    }
}

impl CameraDevice {
    /// Create a device, inferring facing from the label
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        let facing = infer_facing(&label);
        Self {
            id: id.into(),
            label,
            facing,
            capabilities: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_facing(mut self, facing: FacingMode) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }

    /// Check if device matches a specifier (exact id, or case-insensitive label substring)
    pub fn matches(&self, specifier: &str) -> bool {
        if self.id == specifier {
            return true;
        }
        let spec_lower = specifier.to_lowercase();
        !spec_lower.is_empty() && self.label.to_lowercase().contains(&spec_lower)
    }

    pub fn is_facing(&self, facing: FacingMode) -> bool {
        self.facing == Some(facing)
    }
}

/// Guess facing direction from a device label
pub fn infer_facing(label: &str) -> Option<FacingMode> {
    if REAR_LABEL.is_match(label) {
        Some(FacingMode::Environment)
    } else if FRONT_LABEL.is_match(label) {
        Some(FacingMode::User)
    } else {
        None
    }
}

/// Find a device by specifier, preferring exact id matches
pub fn find_device<'a>(devices: &'a [CameraDevice], specifier: &str) -> Option<&'a CameraDevice> {
    devices
        .iter()
        .find(|d| d.id == specifier)
        .or_else(|| devices.iter().find(|d| d.matches(specifier)))
}

/// Choose the selector used when the caller names no device.
///
/// The first device facing `facing` wins, then the first device at all;
/// with nothing enumerated only the facing hint is left.
pub fn pick_default_device(devices: &[CameraDevice], facing: FacingMode) -> DeviceSelector {
    devices
        .iter()
        .find(|d| d.is_facing(facing))
        .or_else(|| devices.first())
        .map(|d| DeviceSelector::exact(d.id.clone(), facing))
        .unwrap_or_else(|| DeviceSelector::facing(facing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_facing_from_labels() {
        assert_eq!(
            infer_facing("Back Dual Wide Camera"),
            Some(FacingMode::Environment)
        );
        assert_eq!(infer_facing("camera2 1, facing back"), Some(FacingMode::Environment));
        assert_eq!(infer_facing("Caméra arrière"), Some(FacingMode::Environment));
        assert_eq!(infer_facing("FaceTime HD Camera"), Some(FacingMode::User));
        assert_eq!(infer_facing("Front Camera"), Some(FacingMode::User));
        assert_eq!(infer_facing("USB Video Device"), None);
    }

    #[test]
    fn test_pick_default_prefers_rear() {
        let devices = vec![
            CameraDevice::new("front-0", "Front Camera"),
            CameraDevice::new("rear-0", "Back Camera"),
        ];
        let selector = pick_default_device(&devices, FacingMode::Environment);
        assert_eq!(selector.device_id(), Some("rear-0"));
    }

    #[test]
    fn test_pick_default_falls_back_to_first() {
        let devices = vec![CameraDevice::new("usb-0", "USB Video Device")];
        let selector = pick_default_device(&devices, FacingMode::Environment);
        assert_eq!(selector.device_id(), Some("usb-0"));
        assert_eq!(selector.facing_mode(), FacingMode::Environment);
    }

    #[test]
    fn test_pick_default_without_devices() {
        let selector = pick_default_device(&[], FacingMode::User);
        assert_eq!(selector, DeviceSelector::facing(FacingMode::User));
    }

    #[test]
    fn test_find_device_by_id_then_label() {
        let devices = vec![
            CameraDevice::new("cam-1", "Back Camera"),
            CameraDevice::new("cam-2", "Front Camera"),
        ];
        assert_eq!(find_device(&devices, "cam-2").map(|d| d.id.as_str()), Some("cam-2"));
        assert_eq!(find_device(&devices, "front").map(|d| d.id.as_str()), Some("cam-2"));
        assert!(find_device(&devices, "missing").is_none());
    }

    #[test]
    fn test_capabilities_serialize_only_when_known() {
        let bare = serde_json::to_value(CameraDevice::new("cam-1", "Back Camera")).unwrap();
        assert!(bare.get("capabilities").is_none());

        let device = CameraDevice::new("cam-1", "Back Camera").with_capabilities(DeviceCapabilities {
            max_width: 1280,
            max_height: 720,
            max_frame_rate: 30,
            focus_modes: vec![FocusMode::Continuous],
        });
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["capabilities"]["max_width"], 1280);
        assert_eq!(value["capabilities"]["focus_modes"][0], "continuous");

        let back: CameraDevice = serde_json::from_value(value).unwrap();
        assert!(back.capabilities.unwrap().supports_focus(FocusMode::Continuous));
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let device = CameraDevice::new("cam-9", "");
        assert_eq!(device.display_name(), "cam-9");
        assert_eq!(device.facing, None);
    }
}
