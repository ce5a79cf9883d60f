//! Artifact store seam
//!
//! The registry does not produce exports itself; it drives an
//! [`ArtifactStore`] collaborator. Production deployments implement the trait
//! over the real analytics backend; [`FixtureStore`] ships with the crate for
//! tests and demos.

use crate::types::{AlertId, ArtifactPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Producer of binary exports for alerts
///
/// Implementations own how the artifact is generated; the registry only
/// relies on this contract. `export` may take seconds to minutes; callers
/// never invoke it on a path that blocks a status response.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Whether the alert is known to the backing system
    async fn alert_exists(&self, alert_id: &AlertId) -> bool;

    /// Produce the export for the alert
    ///
    /// Returns the artifact payload, or a human-readable failure reason that
    /// the registry records verbatim on the failed job.
    async fn export(&self, alert_id: &AlertId) -> std::result::Result<ArtifactPayload, String>;
}

/// Per-alert fixture describing what [`FixtureStore::export`] should do
#[derive(Clone, Debug)]
enum Fixture {
    /// Serve this payload
    Payload(ArtifactPayload),
    /// Fail with this message
    Failure(String),
}

/// In-memory [`ArtifactStore`] with configurable payloads, latency, and
/// failures
///
/// Useful for wiring up the registry server in tests and demos without a real
/// analytics backend.
#[derive(Clone, Default)]
pub struct FixtureStore {
    fixtures: Arc<RwLock<HashMap<AlertId, Fixture>>>,
    latency: Option<Duration>,
}

impl FixtureStore {
    /// Create an empty fixture store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fixture store whose exports take `latency` to produce
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            fixtures: Arc::default(),
            latency: Some(latency),
        }
    }

    /// Register an alert whose export succeeds with the given payload
    pub async fn put_artifact(&self, alert_id: impl Into<AlertId>, payload: ArtifactPayload) {
        self.fixtures
            .write()
            .await
            .insert(alert_id.into(), Fixture::Payload(payload));
    }

    /// Register an alert whose export fails with the given message
    pub async fn put_failure(&self, alert_id: impl Into<AlertId>, message: impl Into<String>) {
        self.fixtures
            .write()
            .await
            .insert(alert_id.into(), Fixture::Failure(message.into()));
    }
}

#[async_trait]
impl ArtifactStore for FixtureStore {
    async fn alert_exists(&self, alert_id: &AlertId) -> bool {
        self.fixtures.read().await.contains_key(alert_id)
    }

    async fn export(&self, alert_id: &AlertId) -> std::result::Result<ArtifactPayload, String> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let fixture = self.fixtures.read().await.get(alert_id).cloned();
        match fixture {
            Some(Fixture::Payload(payload)) => Ok(payload),
            Some(Fixture::Failure(message)) => Err(message),
            None => Err(format!("alert {alert_id} not found")),
        }
    }
}
