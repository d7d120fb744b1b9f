//! Push-callback adapter
//!
//! For engines that open the camera themselves and invoke a callback per
//! decoded symbol. Before every re-prepare the adapter runs the engine's
//! stop-if-scanning-then-clear cleanup so a restart never inherits a live
//! camera from the previous run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use camscan_core::prelude::*;
use camscan_core::{BarcodeFormat, ConstraintCandidate, EngineKind};

use crate::engine::{DetectionSink, EngineAdapter, EngineContainer, Started};

/// Callbacks handed to a push engine at scan start
#[derive(Clone)]
pub struct DecodeCallbacks {
    on_decode: Arc<dyn Fn(String, BarcodeFormat) + Send + Sync>,
    on_capture_lost: Arc<dyn Fn(String) + Send + Sync>,
}

impl DecodeCallbacks {
    pub fn new(
        on_decode: impl Fn(String, BarcodeFormat) + Send + Sync + 'static,
        on_capture_lost: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_decode: Arc::new(on_decode),
            on_capture_lost: Arc::new(on_capture_lost),
        }
    }

    fn from_sink(sink: DetectionSink) -> Self {
        let lost = sink.clone();
        Self::new(
            move |value, format| {
                sink.emit(value, format);
            },
            move |reason| lost.capture_lost(reason),
        )
    }

    pub fn decoded(&self, value: impl Into<String>, format: BarcodeFormat) {
        (self.on_decode)(value.into(), format)
    }

    pub fn capture_lost(&self, reason: impl Into<String>) {
        (self.on_capture_lost)(reason.into())
    }
}

impl fmt::Debug for DecodeCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeCallbacks").finish_non_exhaustive()
    }
}

/// Engine-side primitives of a push-callback decoder
#[trait_variant::make(CallbackEngine: Send)]
pub trait LocalCallbackEngine {
    /// Allocate decoder state for the given symbologies
    async fn init(&mut self, formats: &[BarcodeFormat]) -> std::result::Result<(), ScanFailure>;

    /// Open the camera for `candidate` and begin invoking `callbacks`
    async fn start_scanning(
        &mut self,
        candidate: &ConstraintCandidate,
        callbacks: DecodeCallbacks,
    ) -> std::result::Result<Started, ScanFailure>;

    fn is_scanning(&self) -> bool;

    async fn stop_scanning(&mut self) -> Result<()>;

    /// Free decoder state; must tolerate being called repeatedly
    async fn clear(&mut self) -> Result<()>;
}

pub struct CallbackAdapter<E> {
    kind: EngineKind,
    engine: E,
    callbacks: Option<DecodeCallbacks>,
}

impl<E: CallbackEngine> CallbackAdapter<E> {
    pub fn new(kind: impl Into<EngineKind>, engine: E) -> Self {
        Self {
            kind: kind.into(),
            engine,
            callbacks: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Stop if scanning, then clear. Every step runs; the first error is returned.
    async fn cleanup(&mut self) -> Result<()> {
        let mut first_error = None;

        if self.engine.is_scanning() {
            if let Err(e) = self.engine.stop_scanning().await {
                warn!("[{}] stop_scanning failed: {}", self.kind, e);
                first_error = Some(e);
            }
        }

        if let Err(e) = self.engine.clear().await {
            warn!("[{}] clear failed: {}", self.kind, e);
            first_error.get_or_insert(e);
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl<E> EngineAdapter for CallbackAdapter<E>
where
    E: CallbackEngine + 'static,
{
    fn kind(&self) -> EngineKind {
        self.kind.clone()
    }

    async fn prepare(
        &mut self,
        container: EngineContainer,
    ) -> std::result::Result<(), ScanFailure> {
        // Error already logged; a failed clear must not block re-init
        let _ = self.cleanup().await;

        self.engine.init(&container.options.formats).await?;
        self.callbacks = Some(DecodeCallbacks::from_sink(container.detection_sink()));
        Ok(())
    }

    async fn start(
        &mut self,
        candidate: &ConstraintCandidate,
    ) -> std::result::Result<Started, ScanFailure> {
        let callbacks = self
            .callbacks
            .clone()
            .ok_or_else(|| ScanFailure::engine_init(format!("{} started before prepare", self.kind)))?;

        let started = self.engine.start_scanning(candidate, callbacks).await?;
        info!("[{}] scanning with {}", self.kind, candidate);
        Ok(started)
    }

    async fn stop(&mut self) -> Result<()> {
        let result = self.cleanup().await;
        self.callbacks = None;
        result
    }
}
