//! Managed-engine adapter
//!
//! Some engines expose a staged API: create a context, switch the camera on,
//! then enable capture. Teardown walks the exact reverse of whatever stages
//! were reached.

use async_trait::async_trait;
use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, ConstraintCandidate, EngineKind};

use crate::engine::{DetectionSink, EngineAdapter, EngineContainer, Started};

#[trait_variant::make(ManagedEngine: Send)]
pub trait LocalManagedEngine {
    async fn create_context(
        &mut self,
        formats: &[BarcodeFormat],
    ) -> std::result::Result<(), ScanFailure>;

    async fn camera_on(
        &mut self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<Started, ScanFailure>;

    async fn enable_capture(&mut self, sink: DetectionSink) -> std::result::Result<(), ScanFailure>;

    async fn disable_capture(&mut self) -> Result<()>;

    async fn camera_off(&mut self) -> Result<()>;

    async fn dispose(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Disposed,
    Context,
    CameraOn,
    Capturing,
}

pub struct ManagedAdapter<E> {
    kind: EngineKind,
    engine: E,
    stage: Stage,
    sink: Option<DetectionSink>,
}

impl<E: ManagedEngine> ManagedAdapter<E> {
    pub fn new(kind: impl Into<EngineKind>, engine: E) -> Self {
        Self {
            kind: kind.into(),
            engine,
            stage: Stage::Disposed,
            sink: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Walk back down from the current stage to `target`
    async fn unwind_to(&mut self, target: Stage) -> Result<()> {
        let mut first_error = None;

        if self.stage >= Stage::Capturing && target < Stage::Capturing {
            if let Err(e) = self.engine.disable_capture().await {
                warn!("[{}] disable_capture failed: {}", self.kind, e);
                first_error.get_or_insert(e);
            }
            self.stage = Stage::CameraOn;
        }

        if self.stage >= Stage::CameraOn && target < Stage::CameraOn {
            if let Err(e) = self.engine.camera_off().await {
                warn!("[{}] camera_off failed: {}", self.kind, e);
                first_error.get_or_insert(e);
            }
            self.stage = Stage::Context;
        }

        if self.stage >= Stage::Context && target < Stage::Context {
            if let Err(e) = self.engine.dispose().await {
                warn!("[{}] dispose failed: {}", self.kind, e);
                first_error.get_or_insert(e);
            }
            self.stage = Stage::Disposed;
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl<E> EngineAdapter for ManagedAdapter<E>
where
    E: ManagedEngine + 'static,
{
    fn kind(&self) -> EngineKind {
        self.kind.clone()
    }

    async fn prepare(
        &mut self,
        container: EngineContainer,
    ) -> std::result::Result<(), ScanFailure> {
        let _ = self.unwind_to(Stage::Disposed).await;

        self.engine
            .create_context(&container.options.formats)
            .await?;
        self.stage = Stage::Context;
        self.sink = Some(container.detection_sink());
        Ok(())
    }

    async fn start(
        &mut self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<Started, ScanFailure> {
        let Some(sink) = self.sink.clone() else {
            return Err(ScanFailure::engine_init(format!(
                "{} started before prepare",
                self.kind
            )));
        };
        if self.stage == Stage::Disposed {
            return Err(ScanFailure::engine_init(format!(
                "{} context was disposed",
                self.kind
            )));
        }
        let _ = self.unwind_to(Stage::Context).await;

        let started = self.engine.camera_on(candidate).await?;
        self.stage = Stage::CameraOn;

        self.engine.enable_capture(sink).await?;
        self.stage = Stage::Capturing;

        info!("[{}] capture enabled with {}", self.kind, candidate);
        Ok(started)
    }

    async fn stop(&mut self) -> Result<()> {
        let result = self.unwind_to(Stage::Disposed).await;
        self.sink = None;
        result
    }
}
