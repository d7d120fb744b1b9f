//! Configuration file parsing for camscan
//!
//! Supports:
//! - `.camscan/config.toml` - Project settings
//! - `.camscan/preferences.toml` - Per-user overrides

pub mod settings;
pub mod types;

pub use settings::{
    init_config_dir, load_effective_settings, load_settings, load_user_preferences,
    merge_preferences, save_user_preferences,
};
pub use types::*;
