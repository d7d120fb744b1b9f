//! camscan Library
//!
//! Headless runner that drives one scan session against a replay camera
//! and reports over NDJSON.

pub mod headless;

pub use headless::runner::{run_headless, HeadlessOptions};
pub use headless::HeadlessEvent;
