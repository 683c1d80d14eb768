//! Explicit lookup of constructed services by resource-type tag.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// Maps resource-type tags to constructed service instances.
///
/// Registration is explicit and typed; a lookup with the wrong type
/// yields `None` rather than a panic. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl ServiceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under `type_tag`, replacing any previous entry.
    pub fn register<S>(&self, type_tag: impl Into<String>, service: S)
    where
        S: Any + Send + Sync,
    {
        let type_tag = type_tag.into();
        debug!(type_tag, "Registering service");
        self.services.write().insert(type_tag, Arc::new(service));
    }

    /// Look up the service registered under `type_tag` as an `S`.
    #[must_use]
    pub fn get<S>(&self, type_tag: &str) -> Option<Arc<S>>
    where
        S: Any + Send + Sync,
    {
        self.services
            .read()
            .get(type_tag)
            .cloned()
            .and_then(|service| service.downcast::<S>().ok())
    }

    /// Whether a service is registered under `type_tag`.
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.services.read().contains_key(type_tag)
    }

    /// The registered type tags, in no particular order.
    #[must_use]
    pub fn type_tags(&self) -> Vec<String> {
        self.services.read().keys().cloned().collect()
    }
}
