//! Application state for the registry API server

use crate::registry::JobRegistry;
use crate::store::ArtifactStore;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the job registry and the artifact store behind it.
#[derive(Clone)]
pub struct AppState {
    /// Export job registry
    pub registry: JobRegistry,

    /// Artifact store (used directly by the direct-retrieval route)
    pub store: Arc<dyn ArtifactStore>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(registry: JobRegistry, store: Arc<dyn ArtifactStore>) -> Self {
        Self { registry, store }
    }
}
