//! Static quality tiers and focus modes

use serde::Serialize;

use crate::types::{FocusMode, QualityProfile, ResolutionBounds};

/// Concrete capture parameters for one [`QualityProfile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityTier {
    pub profile: QualityProfile,
    pub resolution: ResolutionBounds,
    pub frame_rate: u32,
}

const TIERS: [QualityTier; 4] = [
    QualityTier {
        profile: QualityProfile::Low,
        resolution: ResolutionBounds::new(320, 640, 240, 480),
        frame_rate: 15,
    },
    QualityTier {
        profile: QualityProfile::Standard,
        resolution: ResolutionBounds::new(720, 1280, 480, 720),
        frame_rate: 30,
    },
    QualityTier {
        profile: QualityProfile::High,
        resolution: ResolutionBounds::new(1080, 1920, 720, 1080),
        frame_rate: 30,
    },
    QualityTier {
        profile: QualityProfile::Ultra,
        resolution: ResolutionBounds::new(2160, 3840, 1080, 2160),
        frame_rate: 30,
    },
];

/// Pure lookup table; holds no state.
pub struct CapabilityCatalog;

impl CapabilityCatalog {
    pub fn tier(profile: QualityProfile) -> QualityTier {
        match profile {
            QualityProfile::Low => TIERS[0],
            QualityProfile::Standard => TIERS[1],
            QualityProfile::High => TIERS[2],
            QualityProfile::Ultra => TIERS[3],
        }
    }

    /// All tiers, lowest first
    pub fn tiers() -> &'static [QualityTier] {
        &TIERS
    }

    pub fn focus_modes() -> &'static [FocusMode] {
        &FocusMode::ALL
    }
}
