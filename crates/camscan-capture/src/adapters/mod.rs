//! Engine adapter variants
//!
//! - [`FramePullAdapter`] - the adapter pulls frames from a capture handle and
//!   hands each one to an opaque [`FrameDecoder`]
//! - [`CallbackAdapter`] - the engine owns its camera and calls back per decode
//! - [`ManagedAdapter`] - the engine exposes a staged context/camera/capture API

mod callback;
mod frame_pull;
mod managed;

pub use callback::{CallbackAdapter, CallbackEngine, DecodeCallbacks, LocalCallbackEngine};
pub use frame_pull::{FrameDecoder, FramePullAdapter, Symbol};
pub use managed::{LocalManagedEngine, ManagedAdapter, ManagedEngine};
