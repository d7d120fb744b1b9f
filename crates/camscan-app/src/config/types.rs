//! Configuration types for camscan
//!
//! Defines:
//! - `Settings` - Project settings (`.camscan/config.toml`)
//! - `SessionSettings` - Controller tuning (debounce, retry, timeouts)
//! - `ScannerSettings` - Default engine, quality and device choices
//! - `UserPreferences` - Per-user overrides (`.camscan/preferences.toml`)

use std::time::Duration;

use camscan_capture::EngineOptions;
use camscan_core::{BarcodeFormat, DeviceSelector, EngineKind, FacingMode, FocusMode, QualityProfile};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Application settings (.camscan/config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub scanner: ScannerSettings,
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.session.max_attempts,
            Duration::from_millis(self.session.backoff_ms),
        )
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.session.debounce_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.session.acquire_timeout_ms)
    }

    /// Options handed to every engine at prepare time
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            formats: self.scanner.formats.clone(),
            scan_interval: Duration::from_millis(self.scanner.scan_interval_ms.max(1)),
        }
    }
}

/// Session controller tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Minimum gap before the same value is reported again
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Acquisition attempts per candidate, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before re-trying a candidate after a busy failure
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Upper bound on a single prepare+start attempt
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_acquire_timeout_ms() -> u64 {
    5000
}

/// Scanner defaults used when a session is started without overrides
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScannerSettings {
    #[serde(default = "default_engine")]
    pub engine: EngineKind,

    #[serde(default)]
    pub quality: QualityProfile,

    /// Focus hint; absent means the device default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<FocusMode>,

    /// Explicit device id; absent means "pick by facing"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default)]
    pub facing: FacingMode,

    /// Symbologies to report; empty reports everything
    #[serde(default = "default_formats")]
    pub formats: Vec<BarcodeFormat>,

    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Ask the presentation layer for haptic feedback on each result
    #[serde(default = "default_vibrate")]
    pub vibrate: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            quality: QualityProfile::default(),
            focus: None,
            device: None,
            facing: FacingMode::default(),
            formats: default_formats(),
            scan_interval_ms: default_scan_interval_ms(),
            vibrate: default_vibrate(),
        }
    }
}

impl ScannerSettings {
    /// Selector from config alone; `facing` stands in for the configured
    /// device's own direction until enumeration can supply it
    pub fn selector(&self) -> DeviceSelector {
        match &self.device {
            Some(id) if !id.is_empty() => DeviceSelector::exact(id.clone(), self.facing),
            _ => DeviceSelector::facing(self.facing),
        }
    }
}

fn default_engine() -> EngineKind {
    EngineKind::new("html5-qrcode")
}

fn default_formats() -> Vec<BarcodeFormat> {
    vec![BarcodeFormat::Code128]
}

fn default_scan_interval_ms() -> u64 {
    100
}

fn default_vibrate() -> bool {
    true
}

/// User-specific overrides (.camscan/preferences.toml)
///
/// Every field is optional; only the ones present override `[scanner]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<FocusMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<FacingMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrate: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.session.debounce_ms, 300);
        assert_eq!(settings.session.max_attempts, 3);
        assert_eq!(settings.session.backoff_ms, 1000);
        assert_eq!(settings.session.acquire_timeout_ms, 5000);
        assert_eq!(settings.scanner.engine.as_str(), "html5-qrcode");
        assert_eq!(settings.scanner.quality, QualityProfile::High);
        assert_eq!(settings.scanner.formats, vec![BarcodeFormat::Code128]);
        assert!(settings.scanner.vibrate);
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let toml_content = r#"
[session]
max_attempts = 5

[scanner]
engine = "zbar"
quality = "low"
focus = "single-shot"
"#;
        let settings: Settings = toml::from_str(toml_content).unwrap();
        assert_eq!(settings.session.max_attempts, 5);
        assert_eq!(settings.session.debounce_ms, 300);
        assert_eq!(settings.scanner.engine.as_str(), "zbar");
        assert_eq!(settings.scanner.quality, QualityProfile::Low);
        assert_eq!(settings.scanner.focus, Some(FocusMode::SingleShot));
        assert_eq!(settings.scanner.scan_interval_ms, 100);
    }

    #[test]
    fn test_selector_from_device() {
        let mut scanner = ScannerSettings::default();
        assert_eq!(scanner.selector(), DeviceSelector::facing(FacingMode::Environment));

        scanner.device = Some("cam-2".to_string());
        assert_eq!(
            scanner.selector(),
            DeviceSelector::exact("cam-2", FacingMode::Environment)
        );

        scanner.device = Some(String::new());
        assert_eq!(scanner.selector().device_id(), None);
    }

    #[test]
    fn test_engine_options_from_settings() {
        let mut settings = Settings::default();
        settings.scanner.formats = vec![BarcodeFormat::QrCode, BarcodeFormat::Ean13];
        settings.scanner.scan_interval_ms = 250;

        let options = settings.engine_options();
        assert_eq!(options.formats, vec![BarcodeFormat::QrCode, BarcodeFormat::Ean13]);
        assert_eq!(options.scan_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_user_preferences_default() {
        let prefs = UserPreferences::default();
        assert!(prefs.engine.is_none());
        assert!(prefs.quality.is_none());
        assert!(prefs.device.is_none());
        assert!(prefs.vibrate.is_none());
    }

    #[test]
    fn test_user_preferences_serialize_skips_unset() {
        let prefs = UserPreferences {
            engine: Some(EngineKind::new("quagga")),
            ..Default::default()
        };
        let content = toml::to_string_pretty(&prefs).unwrap();
        assert!(content.contains("engine = \"quagga\""));
        assert!(!content.contains("quality"));
    }
}
