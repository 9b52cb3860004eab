//! State handed to every dispatch handler

use hostlink_core::{DiagnosticRegistry, DiagnosticsConfig, DiagnosticsHost};
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Mutable state of one runtime, next to its bridge
///
/// Feature classes keep their own state (callback registries, caches) as
/// extensions keyed by type, so one router can serve every class.
pub struct RuntimeState {
    diagnostics: DiagnosticRegistry,
    extensions: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl RuntimeState {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            diagnostics: DiagnosticRegistry::new(config),
            extensions: HashMap::new(),
        }
    }

    pub fn diagnostics_ref(&self) -> &DiagnosticRegistry {
        &self.diagnostics
    }

    /// Install an extension, replacing any previous value of the same type
    pub fn insert_extension<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.extensions
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn extension<T: Any + Send>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn extension_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }
}

impl DiagnosticsHost for RuntimeState {
    fn diagnostics(&mut self) -> &mut DiagnosticRegistry {
        &mut self.diagnostics
    }
}
