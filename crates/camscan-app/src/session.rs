//! Scan-session aggregate and its read-only snapshots

use std::sync::atomic::{AtomicU64, Ordering};

use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, EngineKind, SessionState};
use chrono::{DateTime, Local};
use serde::Serialize;

/// Unique identifier for a scan session
pub type SessionId = u64;

static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique session ID
pub fn next_session_id() -> SessionId {
    SESSION_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Most recent accepted detection of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastResult {
    pub value: String,
    pub format: BarcodeFormat,
    pub timestamp: DateTime<Local>,
}

/// Whether the lifecycle allows moving from `from` to `to`
pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;
    matches!(
        (from, to),
        (Idle | Failed, Negotiating)
            | (Negotiating, Acquiring)
            | (Acquiring, RetryingAcquire | Running | Failed)
            | (RetryingAcquire, Acquiring)
            | (Running, Failed)
            | (Negotiating | Acquiring | RetryingAcquire | Running, Stopping)
            | (Stopping, Idle)
    )
}

/// One start-to-stop scan lifecycle.
///
/// Owned exclusively by the controller task; everyone else sees
/// [`SessionSnapshot`] copies.
#[derive(Debug, Clone)]
pub struct ScanSession {
    id: SessionId,
    state: SessionState,
    engine: EngineKind,
    constraint_index: usize,
    retry_count: u32,
    last_result: Option<LastResult>,
}

impl ScanSession {
    pub(crate) fn new(engine: EngineKind) -> Self {
        Self {
            id: next_session_id(),
            state: SessionState::Idle,
            engine,
            constraint_index: 0,
            retry_count: 0,
            last_result: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn engine(&self) -> &EngineKind {
        &self.engine
    }

    pub fn last_result(&self) -> Option<&LastResult> {
        self.last_result.as_ref()
    }

    /// Move to `to`, returning the previous state
    pub(crate) fn transition(&mut self, to: SessionState) -> SessionState {
        let from = self.state;
        if !is_valid_transition(from, to) {
            warn!("Session {}: unexpected transition {} -> {}", self.id, from, to);
        }
        self.state = to;
        from
    }

    pub(crate) fn set_attempt(&mut self, constraint_index: usize, retry_count: u32) {
        self.constraint_index = constraint_index;
        self.retry_count = retry_count;
    }

    pub(crate) fn record_result(&mut self, value: String, format: BarcodeFormat) -> &LastResult {
        self.last_result.insert(LastResult {
            value,
            format,
            timestamp: Local::now(),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some(self.id),
            state: self.state,
            last_result: self.last_result.clone(),
            active_engine: (self.state != SessionState::Idle).then(|| self.engine.clone()),
            active_constraint_index: self.constraint_index,
            retry_count: self.retry_count,
        }
    }
}

/// Immutable view of the controller's session, safe to hand to observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// None until the first session is started
    pub session_id: Option<SessionId>,
    pub state: SessionState,
    pub last_result: Option<LastResult>,
    pub active_engine: Option<EngineKind>,
    pub active_constraint_index: usize,
    pub retry_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        let a = ScanSession::new(EngineKind::new("zbar"));
        let b = ScanSession::new(EngineKind::new("zbar"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_transition_returns_previous() {
        let mut session = ScanSession::new(EngineKind::new("zbar"));
        assert_eq!(session.transition(SessionState::Negotiating), SessionState::Idle);
        assert_eq!(session.transition(SessionState::Acquiring), SessionState::Negotiating);
        assert_eq!(session.state(), SessionState::Acquiring);
    }

    #[test]
    fn test_valid_transitions() {
        use SessionState::*;
        assert!(is_valid_transition(Idle, Negotiating));
        assert!(is_valid_transition(Failed, Negotiating));
        assert!(is_valid_transition(Acquiring, RetryingAcquire));
        assert!(is_valid_transition(RetryingAcquire, Stopping));
        assert!(is_valid_transition(Running, Failed));
        assert!(is_valid_transition(Stopping, Idle));

        assert!(!is_valid_transition(Idle, Running));
        assert!(!is_valid_transition(Stopping, Failed));
        assert!(!is_valid_transition(Negotiating, Running));
        assert!(!is_valid_transition(Failed, Stopping));
    }

    #[test]
    fn test_snapshot_hides_engine_when_idle() {
        let mut session = ScanSession::new(EngineKind::new("quagga"));
        assert_eq!(session.snapshot().active_engine, None);

        session.transition(SessionState::Negotiating);
        session.transition(SessionState::Acquiring);
        session.set_attempt(1, 2);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.active_engine, Some(EngineKind::new("quagga")));
        assert_eq!(snapshot.active_constraint_index, 1);
        assert_eq!(snapshot.retry_count, 2);
        assert_eq!(snapshot.session_id, Some(session.id()));
    }

    #[test]
    fn test_record_result_updates_last_result() {
        let mut session = ScanSession::new(EngineKind::new("zbar"));
        session.record_result("4006381333931".into(), BarcodeFormat::Ean13);
        let last = session.last_result().unwrap();
        assert_eq!(last.value, "4006381333931");
        assert_eq!(last.format, BarcodeFormat::Ean13);
    }

    #[test]
    fn test_default_snapshot_is_idle() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(snapshot.session_id.is_none());
        assert!(snapshot.last_result.is_none());
    }
}
