//! Prelude for common imports used throughout all camscan crates

pub use crate::error::{Error, Result, ResultExt};
pub use crate::failure::{FailureKind, ScanFailure};
pub use tracing::{debug, error, info, instrument, trace, warn};
