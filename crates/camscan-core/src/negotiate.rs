//! Constraint negotiation
//!
//! Turns a quality profile and device selection into an ordered fallback
//! chain of [`ConstraintCandidate`]s. Relaxation order is fixed:
//!
//! 1. fully specified (device, resolution, frame rate, focus)
//! 2. focus hint dropped
//! 3. resolution and frame rate dropped
//! 4. explicit device id replaced by its facing hint
//!
//! Steps that would not change the previous candidate are skipped, so the
//! chain never repeats a request. The last candidate is always minimal.

use crate::catalog::CapabilityCatalog;
use crate::types::{ConstraintCandidate, DeviceSelector, FocusMode, QualityProfile};

/// Ordered, non-empty list of acquisition requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateChain {
    candidates: Vec<ConstraintCandidate>,
}

impl CandidateChain {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConstraintCandidate> {
        self.candidates.get(index)
    }

    pub fn first(&self) -> &ConstraintCandidate {
        &self.candidates[0]
    }

    pub fn last(&self) -> &ConstraintCandidate {
        &self.candidates[self.candidates.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintCandidate> {
        self.candidates.iter()
    }
}

impl<'a> IntoIterator for &'a CandidateChain {
    type Item = &'a ConstraintCandidate;
    type IntoIter = std::slice::Iter<'a, ConstraintCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Build the fallback chain for a start request. Pure function of its inputs.
pub fn build_chain(
    profile: QualityProfile,
    selector: &DeviceSelector,
    focus: Option<FocusMode>,
) -> CandidateChain {
    let tier = CapabilityCatalog::tier(profile);

    let full = ConstraintCandidate {
        device: selector.clone(),
        resolution: Some(tier.resolution),
        frame_rate: Some(tier.frame_rate),
        focus,
    };

    let without_focus = ConstraintCandidate {
        focus: None,
        ..full.clone()
    };

    let without_resolution = ConstraintCandidate {
        resolution: None,
        frame_rate: None,
        ..without_focus.clone()
    };

    let minimal = ConstraintCandidate::minimal(selector.facing_mode());

    let mut candidates: Vec<ConstraintCandidate> = Vec::with_capacity(4);
    for candidate in [full, without_focus, without_resolution, minimal] {
        if candidates.last() != Some(&candidate) {
            candidates.push(candidate);
        }
    }

    CandidateChain { candidates }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FacingMode;

    #[test]
    fn test_full_chain_for_explicit_device_with_focus() {
        let selector = DeviceSelector::exact("cam-0", FacingMode::Environment);
        let chain = build_chain(QualityProfile::High, &selector, Some(FocusMode::Continuous));

        assert_eq!(chain.len(), 4);

        let first = chain.first();
        assert_eq!(first.device, selector);
        assert_eq!(first.resolution.map(|r| r.ideal_width), Some(1920));
        assert_eq!(first.frame_rate, Some(30));
        assert_eq!(first.focus, Some(FocusMode::Continuous));

        let second = chain.get(1).unwrap();
        assert!(second.focus.is_none());
        assert!(second.resolution.is_some());

        let third = chain.get(2).unwrap();
        assert_eq!(third.device, selector);
        assert!(third.resolution.is_none());
        assert!(third.frame_rate.is_none());

        assert_eq!(chain.last(), &ConstraintCandidate::minimal(FacingMode::Environment));
    }

    #[test]
    fn test_no_focus_skips_focus_step() {
        let selector = DeviceSelector::exact("cam-0", FacingMode::Environment);
        let chain = build_chain(QualityProfile::High, &selector, None);

        assert_eq!(chain.len(), 3);
        assert!(chain.get(1).unwrap().resolution.is_none());
        assert_eq!(chain.get(1).unwrap().device.device_id(), Some("cam-0"));
    }

    #[test]
    fn test_facing_selector_collapses_device_step() {
        let selector = DeviceSelector::facing(FacingMode::User);
        let chain = build_chain(QualityProfile::Low, &selector, None);

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.last(), &ConstraintCandidate::minimal(FacingMode::User));
    }

    #[test]
    fn test_chain_is_pure() {
        let selector = DeviceSelector::exact("cam-9", FacingMode::User);
        for profile in QualityProfile::ALL {
            for focus in [None, Some(FocusMode::Macro)] {
                let a = build_chain(profile, &selector, focus);
                let b = build_chain(profile, &selector, focus);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_last_candidate_always_minimal() {
        let selectors = [
            DeviceSelector::exact("cam-0", FacingMode::Environment),
            DeviceSelector::facing(FacingMode::Environment),
            DeviceSelector::facing(FacingMode::User),
        ];
        for selector in &selectors {
            for profile in QualityProfile::ALL {
                for focus in [None, Some(FocusMode::SingleShot)] {
                    let chain = build_chain(profile, selector, focus);
                    assert!(!chain.is_empty());
                    let last = chain.last();
                    assert!(last.is_minimal(), "{} not minimal", last);
                    assert!(last.resolution.is_none());
                    assert!(last.focus.is_none());
                }
            }
        }
    }

    #[test]
    fn test_chain_has_no_consecutive_duplicates() {
        let selector = DeviceSelector::facing(FacingMode::Environment);
        let chain = build_chain(QualityProfile::Ultra, &selector, Some(FocusMode::Manual));
        let items: Vec<_> = chain.iter().collect();
        for pair in items.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}
