//! # camscan-app - Session Orchestration
//!
//! Runs scan sessions on top of the capture layer: a single controller task
//! owns the active [`ScanSession`], walks the candidate chain with bounded
//! retries, debounces detections and reports through a [`NotificationSink`].
//!
//! ## Public API
//!
//! ### Controller (`controller`)
//! - [`SessionController`] - Handle to the controller task
//! - [`StartRequest`], [`ControllerConfig`] - Session parameters and tuning
//!
//! ### Session State (`session`)
//! - [`SessionSnapshot`] - Read-only view of the current session
//! - [`SessionId`], [`LastResult`]
//!
//! ### Notifications (`notify`)
//! - [`NotificationSink`] - Outbound results, state changes and fatal errors
//! - [`BroadcastSink`], [`TracingSink`], [`FanoutSink`]
//!
//! ### Engines (`registry`)
//! - [`EngineRegistry`] - One adapter per engine kind
//!
//! ### Configuration (`config`)
//! - [`config::Settings`], [`config::UserPreferences`] - `.camscan/` files

pub mod config;
pub mod controller;
pub mod notify;
pub mod registry;
pub mod retry;
pub mod session;

pub use controller::{ControllerConfig, SessionController, StartRequest};
pub use notify::{
    BroadcastSink, FanoutSink, FatalError, NotificationSink, ScanResult, SessionNotification,
    StateChange, TracingSink,
};
pub use registry::EngineRegistry;
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use session::{next_session_id, LastResult, ScanSession, SessionId, SessionSnapshot};
