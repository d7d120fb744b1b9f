//! # camscan-core - Core Domain Types
//!
//! Foundation crate for camscan. Provides the scan-session data model, the
//! quality catalog, constraint negotiation, result debouncing, the failure
//! taxonomy and error handling.
//!
//! This crate has **zero internal dependencies** and no async runtime.
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`QualityProfile`], [`FocusMode`], [`FacingMode`] - Caller-facing capture choices
//! - [`DeviceSelector`] - Explicit device id or facing-direction hint
//! - [`ConstraintCandidate`] - One fully specified acquisition request
//! - [`DetectionEvent`], [`BarcodeFormat`] - Raw detections from an engine
//! - [`SessionState`] - Scan-session lifecycle state
//!
//! ### Negotiation (`catalog`, `negotiate`)
//! - [`CapabilityCatalog`] - Quality tiers and focus modes
//! - [`build_chain()`] - Ordered fallback chain of candidates
//!
//! ### Debouncing (`debounce`)
//! - [`ResultDebouncer`] - Suppresses repeated detections inside a window
//!
//! ### Error Handling (`error`, `failure`)
//! - [`FailureKind`], [`ScanFailure`] - Classified adapter failures
//! - [`Error`], [`Result`], [`ResultExt`] - Crate-wide error type
//!
//! ## Prelude
//!
//! ```rust
//! use camscan_core::prelude::*;
//! ```

pub mod catalog;
pub mod debounce;
pub mod error;
pub mod failure;
pub mod logging;
pub mod negotiate;
pub mod prelude;
pub mod types;

pub use catalog::{CapabilityCatalog, QualityTier};
pub use debounce::{Debounce, ResultDebouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use error::{Error, Result, ResultExt};
pub use failure::{FailureClass, FailureKind, ScanFailure};
pub use negotiate::{build_chain, CandidateChain};
pub use types::{
    BarcodeFormat, ConstraintCandidate, DetectionEvent, DeviceSelector, EngineKind, FacingMode,
    FocusMode, QualityProfile, ResolutionBounds, SessionState,
};
