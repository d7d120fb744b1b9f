//! Duplicate-detection suppression
//!
//! Engines re-report the code in view on every processed frame. The
//! debouncer lets a value through when it differs from the last accepted
//! one, or when the same value reappears after the window has elapsed.

use std::time::{Duration, Instant};

use crate::types::DetectionEvent;

/// Default window between two reports of the same value
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Outcome of [`ResultDebouncer::accept`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Debounce {
    Accepted(String),
    Suppressed,
}

impl Debounce {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Debounce::Accepted(_))
    }
}

#[derive(Debug, Clone)]
pub struct ResultDebouncer {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Default for ResultDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

impl ResultDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether `event` is a new result. Suppressed events leave the
    /// stored value and timestamp untouched.
    pub fn accept(&mut self, event: &DetectionEvent) -> Debounce {
        let accepted = match &self.last {
            None => true,
            Some((value, at)) => {
                *value != event.value
                    || event.timestamp.saturating_duration_since(*at) >= self.window
            }
        };

        if !accepted {
            return Debounce::Suppressed;
        }

        self.last = Some((event.value.clone(), event.timestamp));
        Debounce::Accepted(event.value.clone())
    }

    pub fn last_value(&self) -> Option<&str> {
        self.last.as_ref().map(|(value, _)| value.as_str())
    }

    /// Forget the last accepted value (new session)
    pub fn reset(&mut self) {
        self.last = None;
    }
}
