//! Settings and preferences persistence

use super::types::{Settings, UserPreferences};
use camscan_core::prelude::*;
use std::path::Path;

const CONFIG_FILENAME: &str = "config.toml";
const PREFERENCES_FILENAME: &str = "preferences.toml";
const CAMSCAN_DIR: &str = ".camscan";

// ─────────────────────────────────────────────────────────────────────────────
// Settings Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Load settings from .camscan/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(CAMSCAN_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Settings with the user's preferences merged on top
pub fn load_effective_settings(project_path: &Path) -> Settings {
    let mut settings = load_settings(project_path);
    if let Some(prefs) = load_user_preferences(project_path) {
        merge_preferences(&mut settings, &prefs);
    }
    settings
}

/// Create default config file in .camscan/ directory
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let camscan_dir = project_path.join(CAMSCAN_DIR);

    if !camscan_dir.exists() {
        std::fs::create_dir_all(&camscan_dir)
            .map_err(|e| Error::config(format!("Failed to create .camscan dir: {}", e)))?;
    }

    let config_path = camscan_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, generate_default_config())
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}

fn generate_default_config() -> String {
    r#"# camscan configuration

[session]
debounce_ms = 300          # Same value is not re-reported inside this window
max_attempts = 3           # Attempts per candidate when the camera reports busy
backoff_ms = 1000          # Wait between busy retries
acquire_timeout_ms = 5000  # Bound on one acquisition attempt

[scanner]
engine = "html5-qrcode"
quality = "high"           # low | standard | high | ultra
facing = "environment"     # environment | user
formats = ["code128"]
scan_interval_ms = 100
vibrate = true
"#
    .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// User Preferences
// ─────────────────────────────────────────────────────────────────────────────

/// Load user preferences from .camscan/preferences.toml
///
/// Returns None if file doesn't exist (not an error - first run)
pub fn load_user_preferences(project_path: &Path) -> Option<UserPreferences> {
    let prefs_path = project_path.join(CAMSCAN_DIR).join(PREFERENCES_FILENAME);

    if !prefs_path.exists() {
        debug!("No preferences file at {:?}", prefs_path);
        return None;
    }

    match std::fs::read_to_string(&prefs_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(prefs) => {
                debug!("Loaded user preferences from {:?}", prefs_path);
                Some(prefs)
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", prefs_path, e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", prefs_path, e);
            None
        }
    }
}

/// Save user preferences to .camscan/preferences.toml
///
/// Uses atomic write (temp file + rename) for safety.
pub fn save_user_preferences(project_path: &Path, prefs: &UserPreferences) -> Result<()> {
    let camscan_dir = project_path.join(CAMSCAN_DIR);

    if !camscan_dir.exists() {
        std::fs::create_dir_all(&camscan_dir)
            .map_err(|e| Error::config(format!("Failed to create .camscan dir: {}", e)))?;
    }

    let prefs_path = camscan_dir.join(PREFERENCES_FILENAME);
    let temp_path = camscan_dir.join(".preferences.toml.tmp");

    let header = "# User-specific scanner preferences\n\
                  # These override [scanner] in config.toml\n\n";

    let content = toml::to_string_pretty(prefs)
        .map_err(|e| Error::config(format!("Failed to serialize preferences: {}", e)))?;

    std::fs::write(&temp_path, format!("{}{}", header, content))
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;

    std::fs::rename(&temp_path, &prefs_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    debug!("Saved user preferences to {:?}", prefs_path);
    Ok(())
}

/// Merge user preferences into settings (user prefs override project settings)
pub fn merge_preferences(settings: &mut Settings, prefs: &UserPreferences) {
    let scanner = &mut settings.scanner;

    if let Some(ref engine) = prefs.engine {
        scanner.engine = engine.clone();
    }
    if let Some(quality) = prefs.quality {
        scanner.quality = quality;
    }
    if let Some(focus) = prefs.focus {
        scanner.focus = Some(focus);
    }
    if let Some(ref device) = prefs.device {
        scanner.device = Some(device.clone());
    }
    if let Some(facing) = prefs.facing {
        scanner.facing = facing;
    }
    if let Some(vibrate) = prefs.vibrate {
        scanner.vibrate = vibrate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camscan_core::{EngineKind, FacingMode, FocusMode, QualityProfile};
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(temp.path());

        assert_eq!(settings.session.max_attempts, 3);
        assert_eq!(settings.scanner.engine.as_str(), "html5-qrcode");
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        let camscan_dir = temp.path().join(".camscan");
        std::fs::create_dir_all(&camscan_dir).unwrap();

        let config = r#"
[session]
backoff_ms = 250

[scanner]
engine = "zxing"
vibrate = false
"#;
        std::fs::write(camscan_dir.join("config.toml"), config).unwrap();

        let settings = load_settings(temp.path());

        assert_eq!(settings.session.backoff_ms, 250);
        assert_eq!(settings.scanner.engine.as_str(), "zxing");
        assert!(!settings.scanner.vibrate);
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        let camscan_dir = temp.path().join(".camscan");
        std::fs::create_dir_all(&camscan_dir).unwrap();

        std::fs::write(camscan_dir.join("config.toml"), "not valid toml {{{{").unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings.session.debounce_ms, 300);
    }

    #[test]
    fn test_init_config_dir() {
        let temp = tempdir().unwrap();

        init_config_dir(temp.path()).unwrap();

        let content = std::fs::read_to_string(temp.path().join(".camscan/config.toml")).unwrap();
        let parsed: Settings = toml::from_str(&content).expect("Default config should be valid TOML");
        assert_eq!(parsed.session.acquire_timeout_ms, 5000);
        assert_eq!(parsed.scanner.quality, QualityProfile::High);
    }

    #[test]
    fn test_init_config_dir_idempotent() {
        let temp = tempdir().unwrap();
        init_config_dir(temp.path()).unwrap();

        let config_path = temp.path().join(".camscan/config.toml");
        std::fs::write(&config_path, "[session]\nmax_attempts = 7\n").unwrap();

        init_config_dir(temp.path()).unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("max_attempts = 7"));
    }

    #[test]
    fn test_load_user_preferences_missing_file() {
        let temp = tempdir().unwrap();
        assert!(load_user_preferences(temp.path()).is_none());
    }

    #[test]
    fn test_save_and_load_user_preferences() {
        let temp = tempdir().unwrap();

        let prefs = UserPreferences {
            engine: Some(EngineKind::new("zbar")),
            quality: Some(QualityProfile::Standard),
            focus: Some(FocusMode::Continuous),
            device: Some("cam-1".to_string()),
            facing: Some(FacingMode::User),
            vibrate: Some(false),
        };

        save_user_preferences(temp.path(), &prefs).unwrap();

        assert!(temp.path().join(".camscan/preferences.toml").exists());
        assert!(!temp.path().join(".camscan/.preferences.toml.tmp").exists());
        assert_eq!(load_user_preferences(temp.path()), Some(prefs));
    }

    #[test]
    fn test_merge_preferences_overrides() {
        let mut settings = Settings::default();
        let prefs = UserPreferences {
            engine: Some(EngineKind::new("scandit")),
            quality: Some(QualityProfile::Ultra),
            vibrate: Some(false),
            ..Default::default()
        };

        merge_preferences(&mut settings, &prefs);

        assert_eq!(settings.scanner.engine.as_str(), "scandit");
        assert_eq!(settings.scanner.quality, QualityProfile::Ultra);
        assert!(!settings.scanner.vibrate);
    }

    #[test]
    fn test_merge_preferences_partial() {
        let mut settings = Settings::default();
        settings.scanner.device = Some("cam-9".to_string());

        let prefs = UserPreferences {
            facing: Some(FacingMode::User),
            ..Default::default()
        };

        merge_preferences(&mut settings, &prefs);

        assert_eq!(settings.scanner.device.as_deref(), Some("cam-9")); // Unchanged
        assert_eq!(settings.scanner.facing, FacingMode::User); // Changed
        assert_eq!(settings.scanner.engine.as_str(), "html5-qrcode");
    }

    #[test]
    fn test_load_effective_settings_applies_preferences() {
        let temp = tempdir().unwrap();
        init_config_dir(temp.path()).unwrap();
        save_user_preferences(
            temp.path(),
            &UserPreferences {
                engine: Some(EngineKind::new("quagga")),
                ..Default::default()
            },
        )
        .unwrap();

        let settings = load_effective_settings(temp.path());
        assert_eq!(settings.scanner.engine.as_str(), "quagga");
        assert_eq!(settings.session.max_attempts, 3);
    }
}
