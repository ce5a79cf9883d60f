//! High-level export facade
//!
//! [`EvidenceExporter`] is the single entry point for retrieving capture
//! evidence: it owns the wire client, the event channel, and the
//! duplicate-invocation guard, and drives one export from request to
//! delivered file.

use crate::client::delivery::{self, Delivered};
use crate::client::guard::InFlightMap;
use crate::client::http::{ExportClient, RetrievalOutcome};
use crate::client::poller;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{AlertId, Event, JobId, Strategy};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Orchestrates evidence exports against the registry API
///
/// Cloning is cheap; clones share the event channel and the in-flight guard,
/// so the one-export-per-(alert, strategy) rule holds across all of them.
#[derive(Clone)]
pub struct EvidenceExporter {
    client: ExportClient,
    config: Arc<Config>,
    events: broadcast::Sender<Event>,
    in_flight: InFlightMap,
}

impl EvidenceExporter {
    /// Create an exporter from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = ExportClient::new(config.api_url.clone(), config.export.request_timeout)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            client,
            config: Arc::new(config),
            events,
            in_flight: InFlightMap::new(),
        })
    }

    /// Subscribe to lifecycle events of all exports driven by this exporter
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// The configuration this exporter was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one export for an alert with the chosen strategy
    ///
    /// Rejects the call with [`Error::AlreadyInFlight`] if an export for the
    /// same alert and strategy is still running. On success the artifact is
    /// on disk under the configured download directory.
    pub async fn export(
        &self,
        alert_id: &AlertId,
        strategy: Strategy,
        cancel: &CancellationToken,
    ) -> Result<Delivered> {
        let _guard = self.in_flight.try_acquire(alert_id, strategy)?;

        tracing::info!(alert_id = %alert_id, %strategy, "export started");
        let result = match strategy {
            Strategy::Queued => self.run_queued(alert_id, cancel).await,
            Strategy::Direct => self.run_direct(alert_id).await,
        };

        match &result {
            Ok(delivered) => {
                let _ = self.events.send(Event::Delivered {
                    alert_id: alert_id.clone(),
                    filename: delivered.filename.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(alert_id = %alert_id, %strategy, error = %e, "export failed");
                let _ = self.events.send(Event::ExportFailed {
                    alert_id: alert_id.clone(),
                    error: e.user_message(),
                });
            }
        }
        result
    }

    /// Queued export with the default (never-cancelled) token
    pub async fn export_queued(&self, alert_id: &AlertId) -> Result<Delivered> {
        self.export(alert_id, Strategy::Queued, &CancellationToken::new())
            .await
    }

    /// Direct export in a single round trip
    pub async fn export_direct(&self, alert_id: &AlertId) -> Result<Delivered> {
        self.export(alert_id, Strategy::Direct, &CancellationToken::new())
            .await
    }

    /// Job-based path: create, poll, download, close
    async fn run_queued(
        &self,
        alert_id: &AlertId,
        cancel: &CancellationToken,
    ) -> Result<Delivered> {
        let job_id = self.client.create_job(alert_id).await?;
        tracing::info!(alert_id = %alert_id, job_id = %job_id, "export job created");
        let _ = self.events.send(Event::JobCreated {
            alert_id: alert_id.clone(),
            job_id: job_id.clone(),
        });

        let polled = poller::poll_until_complete(
            &self.client,
            alert_id,
            &job_id,
            &self.config.export,
            cancel,
            &self.events,
        )
        .await;

        let result = match polled {
            Ok(()) => self.download_and_deliver(alert_id, &job_id).await,
            Err(e) => Err(e),
        };

        // A cancelled export leaves the job alone so a later attempt can
        // still observe it; every other outcome disposes it
        if !matches!(result, Err(Error::Cancelled)) {
            self.close_job_best_effort(alert_id, &job_id).await;
        }
        result
    }

    async fn download_and_deliver(&self, alert_id: &AlertId, job_id: &JobId) -> Result<Delivered> {
        match self.client.fetch_artifact(alert_id, job_id).await? {
            RetrievalOutcome::Binary(payload) => {
                delivery::deliver(payload, &self.config.export.download_dir).await
            }
            RetrievalOutcome::ErrorBody(message) => Err(Error::JobFailed { message }),
        }
    }

    /// Direct path: single round trip, no job lifecycle
    async fn run_direct(&self, alert_id: &AlertId) -> Result<Delivered> {
        match self.client.fetch_direct(alert_id).await? {
            RetrievalOutcome::Binary(payload) => {
                delivery::deliver(payload, &self.config.export.download_dir).await
            }
            RetrievalOutcome::ErrorBody(message) => Err(Error::JobFailed { message }),
        }
    }

    /// Dispose the job server-side; a failed close never overrides the
    /// export's own outcome
    async fn close_job_best_effort(&self, alert_id: &AlertId, job_id: &JobId) {
        if let Err(e) = self.client.close_job(alert_id, job_id).await {
            tracing::warn!(alert_id = %alert_id, job_id = %job_id, error = %e, "job close failed");
        }
    }
}
