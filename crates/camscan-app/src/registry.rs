//! Engine registry
//!
//! Holds one adapter per engine kind. The controller checks an adapter out
//! for the lifetime of a session and returns it after teardown.

use std::collections::BTreeMap;

use camscan_capture::EngineAdapter;
use camscan_core::prelude::*;
use camscan_core::EngineKind;

#[derive(Default)]
pub struct EngineRegistry {
    adapters: BTreeMap<EngineKind, Box<dyn EngineAdapter>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own kind, replacing any previous one
    pub fn register(&mut self, adapter: Box<dyn EngineAdapter>) {
        let kind = adapter.kind();
        if self.adapters.insert(kind.clone(), adapter).is_some() {
            warn!("Replaced engine adapter '{}'", kind);
        } else {
            debug!("Registered engine adapter '{}'", kind);
        }
    }

    pub fn with_adapters(adapters: impl IntoIterator<Item = Box<dyn EngineAdapter>>) -> Self {
        let mut registry = Self::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    pub fn contains(&self, kind: &EngineKind) -> bool {
        self.adapters.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<EngineKind> {
        self.adapters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Check an adapter out; `Error::UnknownEngine` if none is registered
    pub(crate) fn take(&mut self, kind: &EngineKind) -> Result<Box<dyn EngineAdapter>> {
        self.adapters
            .remove(kind)
            .ok_or_else(|| Error::unknown_engine(kind.as_str()))
    }

    /// Return a checked-out adapter
    pub(crate) fn restore(&mut self, adapter: Box<dyn EngineAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camscan_capture::test_utils::ScriptedAdapter;

    fn adapter(kind: &str) -> Box<dyn EngineAdapter> {
        Box::new(ScriptedAdapter::new(kind).0)
    }

    #[test]
    fn test_register_and_kinds_sorted() {
        let registry = EngineRegistry::with_adapters([adapter("zxing"), adapter("html5-qrcode")]);
        assert_eq!(
            registry.kinds(),
            vec![EngineKind::new("html5-qrcode"), EngineKind::new("zxing")]
        );
        assert!(registry.contains(&EngineKind::new("zxing")));
        assert!(!registry.contains(&EngineKind::new("scandit")));
    }

    #[test]
    fn test_take_and_restore() {
        let mut registry = EngineRegistry::with_adapters([adapter("zbar")]);
        let kind = EngineKind::new("zbar");

        let taken = registry.take(&kind).unwrap();
        assert!(registry.is_empty());

        registry.restore(taken);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_take_unknown_engine() {
        let mut registry = EngineRegistry::new();
        let err = registry.take(&EngineKind::new("quagga")).err().unwrap();
        assert!(matches!(err, Error::UnknownEngine { ref engine } if engine == "quagga"));
        assert_eq!(err.failure_kind(), Some(FailureKind::EngineInitError));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = EngineRegistry::new();
        registry.register(adapter("zbar"));
        registry.register(adapter("zbar"));
        assert_eq!(registry.len(), 1);
    }
}
