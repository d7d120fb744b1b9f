//! Headless mode runner - session event loop without a UI
//!
//! Owns one [`SessionController`] backed by the replay camera, forwards its
//! notifications to stdout as NDJSON and applies commands read from stdin.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use camscan_app::config::{
    init_config_dir, load_effective_settings, load_user_preferences, save_user_preferences,
    Settings, UserPreferences,
};
use camscan_app::{
    BroadcastSink, EngineRegistry, FanoutSink, SessionController, SessionNotification,
    StartRequest, TracingSink,
};
use camscan_capture::{
    find_device, pick_default_device, replay_adapters, CameraDevice, CaptureSubsystem,
    ReplayCamera,
};
use camscan_core::prelude::*;
use camscan_core::{DeviceSelector, EngineKind, FocusMode, QualityProfile};

use super::HeadlessEvent;

const STDIN_CHANNEL_CAPACITY: usize = 16;

/// What one headless run should do
#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub project_path: PathBuf,
    pub fixture: PathBuf,
    pub engine: Option<EngineKind>,
    pub quality: Option<QualityProfile>,
    pub focus: Option<FocusMode>,
    pub device: Option<String>,
    /// Stop and exit once this much time has passed
    pub duration: Option<Duration>,
    /// Print enumerated devices and exit without starting a session
    pub list_devices: bool,
}

impl HeadlessOptions {
    pub fn new(project_path: impl Into<PathBuf>, fixture: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            fixture: fixture.into(),
            engine: None,
            quality: None,
            focus: None,
            device: None,
            duration: None,
            list_devices: false,
        }
    }

    /// Command-line flags win over config and preferences for this run only
    pub fn apply(&self, settings: &mut Settings) {
        let scanner = &mut settings.scanner;
        if let Some(ref engine) = self.engine {
            scanner.engine = engine.clone();
        }
        if let Some(quality) = self.quality {
            scanner.quality = quality;
        }
        if let Some(focus) = self.focus {
            scanner.focus = Some(focus);
        }
        if let Some(ref device) = self.device {
            scanner.device = Some(device.clone());
        }
    }
}

/// Commands accepted on stdin, one per line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinCommand {
    Start,
    Stop,
    Engine(EngineKind),
    Quit,
}

impl StdinCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = match (words.next()?, words.next()) {
            ("start", None) => StdinCommand::Start,
            ("s" | "stop", None) => StdinCommand::Stop,
            ("q" | "quit", None) => StdinCommand::Quit,
            ("engine", Some(kind)) => StdinCommand::Engine(EngineKind::new(kind)),
            _ => return None,
        };
        if words.next().is_some() {
            return None;
        }
        Some(command)
    }
}

/// Run in headless mode - output JSON events instead of a UI
pub async fn run_headless(options: HeadlessOptions) -> Result<()> {
    color_eyre::install().map_err(|e| Error::runtime(e.to_string()))?;
    camscan_core::logging::init()?;

    info!("═══════════════════════════════════════════════════════");
    info!("camscan starting in HEADLESS mode");
    info!("Project: {}", options.project_path.display());
    info!("Fixture: {}", options.fixture.display());
    info!("═══════════════════════════════════════════════════════");

    if let Err(e) = init_config_dir(&options.project_path) {
        warn!("Could not create config directory: {}", e);
    }

    let mut settings = load_effective_settings(&options.project_path);
    options.apply(&mut settings);

    let camera =
        ReplayCamera::from_file(&options.fixture).context("Failed to load replay fixture")?;
    let devices = camera.enumerate_devices().await?;
    info!("Found {} camera(s)", devices.len());
    HeadlessEvent::devices(&devices).emit();

    if options.list_devices {
        return Ok(());
    }

    let request = initial_request(&settings, &devices);
    let (controller, notifications) = spawn_controller(&camera, &settings);

    let (stdin_tx, stdin_rx) = mpsc::channel(STDIN_CHANNEL_CAPACITY);
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(stdin_tx);
    });

    let result = headless_event_loop(
        controller,
        notifications,
        stdin_rx,
        request,
        HeadlessLoop {
            project_path: options.project_path.clone(),
            duration: options.duration,
        },
        |event| event.emit(),
    )
    .await;

    info!("camscan headless mode exiting");
    result
}

/// The request used for the automatic first start
///
/// A configured device is looked up by id or label so the request carries
/// that camera's own facing as its last fallback. Without one the rear
/// camera from enumeration is picked.
pub fn initial_request(settings: &Settings, devices: &[CameraDevice]) -> StartRequest {
    let scanner = &settings.scanner;
    let request = StartRequest::from_settings(scanner);
    match scanner.device.as_deref() {
        Some(specifier) if !specifier.is_empty() => match find_device(devices, specifier) {
            Some(device) => request.with_selector(DeviceSelector::exact(
                device.id.clone(),
                device.facing.unwrap_or(scanner.facing),
            )),
            None => {
                warn!("Configured camera '{}' not found, trying it anyway", specifier);
                request
            }
        },
        _ => request.with_selector(pick_default_device(devices, scanner.facing)),
    }
}

/// Controller over every replay-backed engine, plus a receiver of its notifications
pub fn spawn_controller(
    camera: &ReplayCamera,
    settings: &Settings,
) -> (SessionController, broadcast::Receiver<SessionNotification>) {
    let registry = EngineRegistry::with_adapters(replay_adapters(camera));

    let broadcaster = BroadcastSink::default();
    let notifications = broadcaster.subscribe();
    let sink = FanoutSink::new()
        .with(Arc::new(broadcaster))
        .with(Arc::new(TracingSink));

    let controller = SessionController::spawn(registry, Arc::new(sink), settings);
    (controller, notifications)
}

pub(crate) struct HeadlessLoop {
    pub project_path: PathBuf,
    pub duration: Option<Duration>,
}

/// Main headless event loop
///
/// Starts `request` immediately, then runs until `quit`, the duration
/// elapses, or stdin closes with no duration set.
pub(crate) async fn headless_event_loop(
    controller: SessionController,
    mut notifications: broadcast::Receiver<SessionNotification>,
    mut commands: mpsc::Receiver<StdinCommand>,
    mut request: StartRequest,
    options: HeadlessLoop,
    mut emit: impl FnMut(HeadlessEvent),
) -> Result<()> {
    info!("Auto-starting session: {}", request);
    controller.start_session(request.clone()).await?;

    let deadline = options.duration.map(|d| Instant::now() + d);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Ok(notification) => emit(HeadlessEvent::from(&notification)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Dropped {} notifications", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Notification channel closed");
                    break;
                }
            },
            command = commands.recv(), if stdin_open => match command {
                Some(StdinCommand::Start) => controller.start_session(request.clone()).await?,
                Some(StdinCommand::Stop) => controller.stop_session().await?,
                Some(StdinCommand::Engine(kind)) => {
                    request.engine = kind.clone();
                    remember_engine(&options.project_path, &kind);
                    controller.switch_engine(kind).await?;
                }
                Some(StdinCommand::Quit) => {
                    info!("Quit requested");
                    break;
                }
                None => {
                    stdin_open = false;
                    if deadline.is_none() {
                        info!("Stdin closed");
                        break;
                    }
                }
            },
            _ = wait_for(deadline) => {
                info!("Scan duration elapsed");
                break;
            }
        }
    }

    controller.shutdown().await?;

    // The controller has joined, so everything it reported is already queued
    while let Ok(notification) = notifications.try_recv() {
        emit(HeadlessEvent::from(&notification));
    }

    Ok(())
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Persist the chosen engine as the user's preference
fn remember_engine(project_path: &Path, kind: &EngineKind) {
    let mut prefs = load_user_preferences(project_path).unwrap_or_else(UserPreferences::default);
    if prefs.engine.as_ref() == Some(kind) {
        return;
    }
    prefs.engine = Some(kind.clone());
    if let Err(e) = save_user_preferences(project_path, &prefs) {
        warn!("Failed to save engine preference: {}", e);
    }
}

/// Read stdin commands and forward them to the event loop (blocking)
fn spawn_stdin_reader_blocking(tx: mpsc::Sender<StdinCommand>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match StdinCommand::parse(trimmed) {
                    Some(command) => {
                        info!("Stdin: {:?}", command);
                        let quit = command == StdinCommand::Quit;
                        if tx.blocking_send(command).is_err() || quit {
                            break;
                        }
                    }
                    None => warn!("Unknown stdin command: {}", trimmed),
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use camscan_capture::ReplayFixture;
    use camscan_core::{DeviceSelector, FacingMode, SessionState};
    use tempfile::tempdir;

    const FIXTURE: &str = r#"
[[devices]]
id = "cam-front"
label = "FaceTime HD Camera"

[[devices]]
id = "cam-rear"
label = "Back Camera"

[[frames]]
symbols = [{ format = "code128", value = "PALLET-42" }]
repeat = 3

[playback]
frame_interval_ms = 50
loop = true
"#;

    fn camera() -> ReplayCamera {
        ReplayCamera::new(ReplayFixture::parse(FIXTURE).unwrap())
    }

    fn states(events: &[HeadlessEvent]) -> Vec<SessionState> {
        events
            .iter()
            .filter_map(|e| match e {
                HeadlessEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_stdin_commands() {
        assert_eq!(StdinCommand::parse("start"), Some(StdinCommand::Start));
        assert_eq!(StdinCommand::parse("s"), Some(StdinCommand::Stop));
        assert_eq!(StdinCommand::parse("stop"), Some(StdinCommand::Stop));
        assert_eq!(StdinCommand::parse("q"), Some(StdinCommand::Quit));
        assert_eq!(
            StdinCommand::parse("engine  zbar"),
            Some(StdinCommand::Engine(EngineKind::new("zbar")))
        );
        assert_eq!(StdinCommand::parse("engine"), None);
        assert_eq!(StdinCommand::parse("engine zbar zxing"), None);
        assert_eq!(StdinCommand::parse("reload"), None);
    }

    #[test]
    fn test_options_override_settings() {
        let mut settings = Settings::default();
        let mut options = HeadlessOptions::new("/tmp/project", "replay.toml");
        options.engine = Some(EngineKind::new("zbar"));
        options.quality = Some(QualityProfile::Low);
        options.device = Some("cam-front".to_string());

        options.apply(&mut settings);

        assert_eq!(settings.scanner.engine, EngineKind::new("zbar"));
        assert_eq!(settings.scanner.quality, QualityProfile::Low);
        assert_eq!(settings.scanner.device.as_deref(), Some("cam-front"));
        assert_eq!(settings.scanner.focus, None);
    }

    #[test]
    fn test_initial_request_picks_rear_camera() {
        let settings = Settings::default();
        let request = initial_request(&settings, &camera().devices());
        assert_eq!(
            request.selector,
            DeviceSelector::exact("cam-rear", FacingMode::Environment)
        );
    }

    #[test]
    fn test_initial_request_keeps_configured_device() {
        let mut settings = Settings::default();
        settings.scanner.device = Some("cam-front".to_string());
        let request = initial_request(&settings, &camera().devices());
        assert_eq!(request.selector.device_id(), Some("cam-front"));
    }

    #[test]
    fn test_configured_front_camera_falls_back_to_user_facing() {
        let mut settings = Settings::default();
        settings.scanner.device = Some("cam-front".to_string());
        let request = initial_request(&settings, &camera().devices());

        assert_eq!(request.selector.facing_mode(), FacingMode::User);
        let chain = camscan_core::build_chain(request.profile, &request.selector, request.focus);
        assert_eq!(chain.last().device, DeviceSelector::facing(FacingMode::User));
    }

    #[test]
    fn test_configured_device_resolves_by_label() {
        let mut settings = Settings::default();
        settings.scanner.device = Some("facetime".to_string());
        let request = initial_request(&settings, &camera().devices());
        assert_eq!(
            request.selector,
            DeviceSelector::exact("cam-front", FacingMode::User)
        );
    }

    #[test]
    fn test_unknown_configured_device_is_kept() {
        let mut settings = Settings::default();
        settings.scanner.device = Some("cam-usb".to_string());
        let request = initial_request(&settings, &camera().devices());
        assert_eq!(
            request.selector,
            DeviceSelector::exact("cam-usb", FacingMode::Environment)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_loop_runs_until_duration() {
        let dir = tempdir().unwrap();
        let camera = camera();
        let settings = Settings::default();
        let (controller, notifications) = spawn_controller(&camera, &settings);
        let (tx, rx) = mpsc::channel(4);
        drop(tx);

        let mut events = Vec::new();
        headless_event_loop(
            controller,
            notifications,
            rx,
            initial_request(&settings, &camera.devices()),
            HeadlessLoop {
                project_path: dir.path().to_path_buf(),
                duration: Some(Duration::from_secs(2)),
            },
            |event| events.push(event),
        )
        .await
        .unwrap();

        let states = states(&events);
        assert!(states.contains(&SessionState::Running));
        assert_eq!(states.last(), Some(&SessionState::Idle));

        let results: Vec<&HeadlessEvent> = events
            .iter()
            .filter(|e| matches!(e, HeadlessEvent::Result { value, .. } if value == "PALLET-42"))
            .collect();
        assert!(!results.is_empty());
        assert!(!camera.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_command_switches_and_saves_preference() {
        let dir = tempdir().unwrap();
        let camera = camera();
        let settings = Settings::default();
        let (controller, notifications) = spawn_controller(&camera, &settings);
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(StdinCommand::Engine(EngineKind::new("zbar")))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(StdinCommand::Quit).await.unwrap();
        });

        let mut events = Vec::new();
        headless_event_loop(
            controller,
            notifications,
            rx,
            initial_request(&settings, &camera.devices()),
            HeadlessLoop {
                project_path: dir.path().to_path_buf(),
                duration: None,
            },
            |event| events.push(event),
        )
        .await
        .unwrap();

        let running = states(&events)
            .iter()
            .filter(|s| **s == SessionState::Running)
            .count();
        assert_eq!(running, 2);

        let prefs = load_user_preferences(dir.path()).unwrap();
        assert_eq!(prefs.engine, Some(EngineKind::new("zbar")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_quit_without_restart() {
        let dir = tempdir().unwrap();
        let camera = camera();
        let settings = Settings::default();
        let (controller, notifications) = spawn_controller(&camera, &settings);
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(StdinCommand::Stop).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(StdinCommand::Quit).await.unwrap();
        });

        let mut events = Vec::new();
        headless_event_loop(
            controller,
            notifications,
            rx,
            initial_request(&settings, &camera.devices()),
            HeadlessLoop {
                project_path: dir.path().to_path_buf(),
                duration: None,
            },
            |event| events.push(event),
        )
        .await
        .unwrap();

        let states = states(&events);
        let idle = states.iter().filter(|s| **s == SessionState::Idle).count();
        assert_eq!(idle, 1);
        assert_eq!(states.last(), Some(&SessionState::Idle));
        assert!(!camera.is_held());
    }
}
