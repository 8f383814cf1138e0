//! Dispatch table resolving operations to their handlers.
//!
//! Handlers are registered per `(operation kind, resource type)` pair, so a
//! deployment can expose a type read-write, append-only, or anything in
//! between. Relationship updates have no registration of their own; they
//! dispatch through the `update` entry for their type.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult};
use crate::handler::ResourceHandler;
use crate::operation::OperationKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegistryKey {
    kind: OperationKind,
    resource_type: String,
}

impl RegistryKey {
    fn new(kind: OperationKind, resource_type: impl Into<String>) -> Self {
        Self {
            kind: kind.registry_kind(),
            resource_type: resource_type.into(),
        }
    }
}

/// The set of registered handlers, consulted once per operation.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<RegistryKey, Arc<dyn ResourceHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one `(kind, type)` pair, replacing any
    /// previous registration for that pair.
    pub fn register(
        &mut self,
        kind: OperationKind,
        resource_type: impl Into<String>,
        handler: Arc<dyn ResourceHandler>,
    ) {
        self.handlers
            .insert(RegistryKey::new(kind, resource_type), handler);
    }

    /// Register the same handler for `add`, `update` and `remove` on one
    /// resource type.
    pub fn register_all(&mut self, resource_type: &str, handler: Arc<dyn ResourceHandler>) {
        for kind in [
            OperationKind::Add,
            OperationKind::Update,
            OperationKind::Remove,
        ] {
            self.register(kind, resource_type, Arc::clone(&handler));
        }
    }

    /// Resolve the handler serving an operation.
    ///
    /// Resolution failures are configuration errors: the document was valid,
    /// but this deployment exposes no handler for the pair.
    pub fn resolve(
        &self,
        kind: OperationKind,
        resource_type: &str,
    ) -> ConfigResult<&Arc<dyn ResourceHandler>> {
        self.handlers
            .get(&RegistryKey::new(kind, resource_type))
            .ok_or_else(|| ConfigError::MissingHandler {
                operation: kind,
                resource_type: resource_type.to_string(),
            })
    }

    /// Number of registered `(kind, type)` pairs.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|key| format!("{} {}", key.kind, key.resource_type))
            .collect();
        keys.sort();
        f.debug_struct("HandlerRegistry")
            .field("registrations", &keys)
            .finish()
    }
}
