//! Scan-session controller
//!
//! One spawned actor task owns the [`ScanSession`] and the engine registry.
//! Callers hold a [`SessionController`] handle: requests go in over an
//! `mpsc` command channel, state comes out as [`SessionSnapshot`]s on a
//! `watch` channel and as notifications on the configured sink.
//!
//! Every suspension point (attempt, backoff, running) also listens for
//! commands, so a stop or a new start preempts whatever is in flight. The
//! previous session is always driven through `Stopping -> Idle` before the
//! next one acquires, which keeps at most one camera acquisition alive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use camscan_capture::{AdapterEvent, EngineAdapter, EngineContainer, EngineOptions, Started};
use camscan_core::prelude::*;
use camscan_core::{
    build_chain, CandidateChain, ConstraintCandidate, Debounce, DetectionEvent, DeviceSelector,
    EngineKind, FocusMode, QualityProfile, ResultDebouncer, SessionState,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{ScannerSettings, Settings};
use crate::notify::{FatalError, NotificationSink, ScanResult, StateChange};
use crate::registry::EngineRegistry;
use crate::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::session::{ScanSession, SessionId, SessionSnapshot};


const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ─────────────────────────────────────────────────────────
// Requests & Configuration
// ─────────────────────────────────────────────────────────

/// Parameters of one session start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub profile: QualityProfile,
    pub selector: DeviceSelector,
    pub focus: Option<FocusMode>,
    pub engine: EngineKind,
}

impl StartRequest {
    /// High quality, rear camera, no focus hint
    pub fn new(engine: impl Into<EngineKind>) -> Self {
        Self {
            profile: QualityProfile::default(),
            selector: DeviceSelector::default(),
            focus: None,
            engine: engine.into(),
        }
    }

    pub fn from_settings(scanner: &ScannerSettings) -> Self {
        Self {
            profile: scanner.quality,
            selector: scanner.selector(),
            focus: scanner.focus,
            engine: scanner.engine.clone(),
        }
    }

    pub fn with_profile(mut self, profile: QualityProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_selector(mut self, selector: DeviceSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_focus(mut self, focus: FocusMode) -> Self {
        self.focus = Some(focus);
        self
    }
}

impl fmt::Display for StartRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.engine, self.profile, self.selector)?;
        if let Some(focus) = self.focus {
            write!(f, " focus={}", focus)?;
        }
        Ok(())
    }
}

/// Controller tuning, usually derived from [`Settings`]
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub retry: RetryPolicy,
    pub debounce_window: Duration,
    pub acquire_timeout: Duration,
    pub engine_options: EngineOptions,
    pub haptic: bool,
}

impl From<&Settings> for ControllerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            retry: settings.retry_policy(),
            debounce_window: settings.debounce_window(),
            acquire_timeout: settings.acquire_timeout(),
            engine_options: settings.engine_options(),
            haptic: settings.scanner.vibrate,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

#[derive(Debug)]
enum Command {
    Start(StartRequest),
    Stop,
    SwitchEngine(EngineKind),
    Shutdown,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Start(_) => "start",
            Command::Stop => "stop",
            Command::SwitchEngine(_) => "switch engine",
            Command::Shutdown => "shutdown",
        }
    }

    /// Reason recorded on the teardown this command causes
    fn teardown_reason(&self) -> String {
        match self {
            Command::Start(_) => "superseded by a new start".to_string(),
            Command::Stop => "stop requested".to_string(),
            Command::SwitchEngine(engine) => format!("switching engine to {}", engine),
            Command::Shutdown => "controller shutting down".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────

/// Handle to the controller task
pub struct SessionController {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Spawn the controller on the current tokio runtime
    pub fn spawn(
        registry: EngineRegistry,
        sink: Arc<dyn NotificationSink>,
        config: impl Into<ControllerConfig>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let actor = ControllerActor {
            registry,
            sink,
            config: config.into(),
            commands: command_rx,
            snapshots: snapshot_tx,
            session: None,
            last_request: None,
        };
        let task = tokio::spawn(actor.run());

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            task,
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|e| Error::channel_send(format!("{} command", e.0.name())))
    }

    /// Start a session; any active one is stopped first
    pub async fn start_session(&self, request: StartRequest) -> Result<()> {
        self.send(Command::Start(request)).await
    }

    /// Stop the active session; a no-op when nothing is active
    pub async fn stop_session(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    /// Restart the last requested session on a different engine
    pub async fn switch_engine(&self, engine: impl Into<EngineKind>) -> Result<()> {
        self.send(Command::SwitchEngine(engine.into())).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        Ok((*snapshot).clone())
    }

    /// Stop any active session and wait for the controller task to exit
    pub async fn shutdown(self) -> Result<()> {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("Controller task already gone");
        }
        self.task
            .await
            .map_err(|e| Error::runtime(format!("Controller task failed: {}", e)))
    }
}

// ─────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────

enum Acquisition {
    Started(Started),
    Failed(ScanFailure),
    Interrupted(Command),
}

enum RunEnd {
    Interrupted(Command),
    CaptureLost(String),
}

struct ControllerActor {
    registry: EngineRegistry,
    sink: Arc<dyn NotificationSink>,
    config: ControllerConfig,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    session: Option<ScanSession>,
    last_request: Option<StartRequest>,
}

impl ControllerActor {
    async fn run(mut self) {
        info!(
            "Session controller started with engines: {:?}",
            self.registry.kinds()
        );
        let mut pending: Option<Command> = None;

        loop {
            let command = match pending.take() {
                Some(command) => command,
                None => match self.commands.recv().await {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Start(request) => pending = self.run_session(request).await,
                Command::SwitchEngine(engine) => match self.last_request.clone() {
                    Some(request) => {
                        pending = self
                            .run_session(StartRequest { engine, ..request })
                            .await
                    }
                    None => warn!("Ignoring switch to '{}': no session was ever started", engine),
                },
                Command::Stop => debug!("Stop requested with no active session"),
                Command::Shutdown => break,
            }
        }

        info!("Session controller stopped");
    }

    /// Drive one session from `Negotiating` until it is idle or failed.
    ///
    /// Returns a command that interrupted the session and still has to be
    /// handled once the teardown is complete.
    #[instrument(skip_all, fields(engine = %request.engine))]
    async fn run_session(&mut self, request: StartRequest) -> Option<Command> {
        self.last_request = Some(request.clone());
        let session = ScanSession::new(request.engine.clone());
        info!("Session {}: starting {}", session.id(), request);
        self.session = Some(session);

        self.transition(SessionState::Negotiating, "start requested");
        let chain = build_chain(request.profile, &request.selector, request.focus);
        debug!(
            "Session {}: {} candidate(s), first {}",
            self.session_id(),
            chain.len(),
            chain.first()
        );
        self.transition(
            SessionState::Acquiring,
            format!("trying {} candidate(s)", chain.len()),
        );

        let mut adapter = match self.registry.take(&request.engine) {
            Ok(adapter) => adapter,
            Err(e) => {
                self.fail(ScanFailure::engine_init(e.to_string()));
                return None;
            }
        };

        let (events_tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let container = EngineContainer::new(events_tx, self.config.engine_options.clone());

        let interrupted = match self.acquire(adapter.as_mut(), &chain, &container).await {
            Acquisition::Started(started) => {
                let reason = match &started.device_id {
                    Some(device) => format!("capturing on {}", device),
                    None => "capturing".to_string(),
                };
                self.transition(SessionState::Running, reason);

                match self.run_until_stopped(&mut events).await {
                    RunEnd::Interrupted(command) => {
                        self.teardown(adapter.as_mut(), &command).await;
                        Some(command)
                    }
                    RunEnd::CaptureLost(reason) => {
                        release(adapter.as_mut(), self.session_id()).await;
                        self.fail(ScanFailure::device_not_found(format!(
                            "capture lost: {}",
                            reason
                        )));
                        None
                    }
                }
            }
            Acquisition::Failed(failure) => {
                self.fail(failure);
                None
            }
            Acquisition::Interrupted(command) => {
                self.teardown(adapter.as_mut(), &command).await;
                Some(command)
            }
        };

        self.registry.restore(adapter);

        match interrupted.map(|command| self.coalesce(command)) {
            Some(Command::Stop) | None => None,
            next => next,
        }
    }

    /// Walk the candidate chain until an attempt starts capture
    async fn acquire(
        &mut self,
        adapter: &mut dyn EngineAdapter,
        chain: &CandidateChain,
        container: &EngineContainer,
    ) -> Acquisition {
        let mut retry = RetryState::new(self.config.retry);
        let mut index = 0;

        while let Some(candidate) = chain.get(index) {
            let attempt = retry.begin_attempt();
            self.set_attempt(index, retry.retry_count());
            debug!(
                "Session {}: candidate {} attempt {}: {}",
                self.session_id(),
                index,
                attempt,
                candidate
            );

            let timeout = self.config.acquire_timeout;
            let outcome = tokio::select! {
                biased;
                command = self.commands.recv() => {
                    return Acquisition::Interrupted(command.unwrap_or(Command::Shutdown));
                }
                outcome = attempt_start(adapter, container, candidate, timeout) => outcome,
            };

            let failure = match outcome {
                Ok(started) => {
                    info!(
                        "Session {}: started on candidate {} ({})",
                        self.session_id(),
                        index,
                        candidate
                    );
                    return Acquisition::Started(started);
                }
                Err(failure) => failure,
            };

            warn!(
                "Session {}: candidate {} attempt {} failed: {}",
                self.session_id(),
                index,
                attempt,
                failure
            );
            release(adapter, self.session_id()).await;

            match retry.on_failure(&failure) {
                RetryDecision::Abort => return Acquisition::Failed(failure),
                RetryDecision::Retry { after } => {
                    self.set_attempt(index, retry.attempts());
                    self.transition(
                        SessionState::RetryingAcquire,
                        format!("{}; retrying in {}ms", failure, after.as_millis()),
                    );
                    tokio::select! {
                        biased;
                        command = self.commands.recv() => {
                            return Acquisition::Interrupted(command.unwrap_or(Command::Shutdown));
                        }
                        _ = tokio::time::sleep(after) => {}
                    }
                    self.transition(SessionState::Acquiring, "retrying same candidate");
                }
                RetryDecision::Advance if index + 1 < chain.len() => {
                    index += 1;
                    retry.reset();
                    info!(
                        "Session {}: falling back to candidate {} after {}",
                        self.session_id(),
                        index,
                        failure.kind
                    );
                }
                RetryDecision::Advance => return Acquisition::Failed(failure),
            }
        }

        Acquisition::Failed(ScanFailure::device_not_found("no acquisition candidates"))
    }

    /// Route detections until a command or a capture loss ends the run
    async fn run_until_stopped(&mut self, events: &mut mpsc::Receiver<AdapterEvent>) -> RunEnd {
        let mut debouncer = ResultDebouncer::new(self.config.debounce_window);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    return RunEnd::Interrupted(command.unwrap_or(Command::Shutdown));
                }
                event = events.recv() => match event {
                    Some(AdapterEvent::Detection(detection)) => {
                        self.on_detection(&mut debouncer, detection);
                    }
                    Some(AdapterEvent::CaptureLost { reason }) => return RunEnd::CaptureLost(reason),
                    None => return RunEnd::CaptureLost("engine event channel closed".to_string()),
                },
            }
        }
    }

    fn on_detection(&mut self, debouncer: &mut ResultDebouncer, detection: DetectionEvent) {
        let value = match debouncer.accept(&detection) {
            Debounce::Accepted(value) => value,
            Debounce::Suppressed => {
                trace!("Suppressed repeat of {}", detection.value);
                return;
            }
        };

        let haptic = self.config.haptic;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let session_id = session.id();
        let last = session.record_result(value, detection.format);
        let result = ScanResult {
            session_id,
            value: last.value.clone(),
            format: last.format,
            timestamp: last.timestamp,
            haptic,
        };

        self.publish();
        self.sink.on_result(&result);
    }

    /// `Stopping -> Idle`, whatever the adapter reports
    async fn teardown(&mut self, adapter: &mut dyn EngineAdapter, cause: &Command) {
        self.transition(SessionState::Stopping, cause.teardown_reason());
        release(adapter, self.session_id()).await;
        self.transition(SessionState::Idle, "resources released");
    }

    fn fail(&mut self, failure: ScanFailure) {
        self.transition(SessionState::Failed, failure.to_string());
        let session_id = self.session_id();
        error!("Session {} failed: {}", session_id, failure);
        self.sink.on_fatal_error(&FatalError {
            session_id,
            kind: failure.kind,
            message: failure.message,
        });
    }

    /// Fold commands queued during a teardown into the one that wins
    fn coalesce(&mut self, mut latest: Command) -> Command {
        while let Ok(command) = self.commands.try_recv() {
            latest = match (latest, command) {
                (Command::Shutdown, _) => Command::Shutdown,
                (Command::Start(request), Command::SwitchEngine(engine)) => {
                    Command::Start(StartRequest { engine, ..request })
                }
                (_, command) => command,
            };
        }
        latest
    }

    fn transition(&mut self, to: SessionState, reason: impl Into<String>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let previous = session.transition(to);
        let change = StateChange {
            session_id: session.id(),
            previous,
            new: to,
            reason: reason.into(),
        };
        debug!(
            "Session {}: {} -> {} ({})",
            change.session_id, previous, to, change.reason
        );

        self.publish();
        self.sink.on_state_change(&change);
    }

    fn set_attempt(&mut self, constraint_index: usize, retry_count: u32) {
        if let Some(session) = self.session.as_mut() {
            session.set_attempt(constraint_index, retry_count);
        }
        self.publish();
    }

    fn publish(&self) {
        if let Some(session) = &self.session {
            self.snapshots.send_replace(session.snapshot());
        }
    }

    fn session_id(&self) -> SessionId {
        self.session.as_ref().map_or(0, ScanSession::id)
    }
}

/// One bounded prepare+start attempt
async fn attempt_start(
    adapter: &mut dyn EngineAdapter,
    container: &EngineContainer,
    candidate: &ConstraintCandidate,
    limit: Duration,
) -> std::result::Result<Started, ScanFailure> {
    let attempt = async {
        adapter.prepare(container.clone()).await?;
        adapter.start(candidate).await
    };

    match tokio::time::timeout(limit, attempt).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ScanFailure::timeout(format!(
            "no capture within {}ms",
            limit.as_millis()
        ))),
    }
}

/// Stop the adapter; errors are logged and otherwise ignored
async fn release(adapter: &mut dyn EngineAdapter, session_id: SessionId) {
    if let Err(e) = adapter.stop().await {
        warn!(
            "Session {}: engine {} stop failed (continuing): {}",
            session_id,
            adapter.kind(),
            e
        );
    }
}
