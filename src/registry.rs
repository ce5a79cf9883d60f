//! Server-side export job registry
//!
//! The registry creates, advances, and reports export jobs over an
//! [`ArtifactStore`]. Each job walks the monotonic state machine
//! `Pending → Processing → Complete | Failed`; terminal states are never left.
//! Jobs live in memory and are disposed either by an explicit close call or
//! by the retention sweep.

use crate::error::RegistryError;
use crate::store::ArtifactStore;
use crate::types::{AlertId, ArtifactPayload, JobId, JobState, StatusReport};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// One tracked export job
#[derive(Debug)]
struct JobEntry {
    alert_id: AlertId,
    state: JobState,
    created_at: DateTime<Utc>,
    /// Failure reason, recorded once when the job enters `Failed`
    failure: Option<String>,
    /// Artifact captured once at completion; repeated reads return this exact
    /// payload, never a regeneration
    artifact: Option<ArtifactPayload>,
}

/// In-memory export job registry (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
    store: Arc<dyn ArtifactStore>,
    /// Monotonic component of job tokens; guarantees ids are never reused
    sequence: Arc<AtomicU64>,
    retention: Duration,
}

impl JobRegistry {
    /// Create a registry over the given artifact store
    pub fn new(store: Arc<dyn ArtifactStore>, retention: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            store,
            sequence: Arc::new(AtomicU64::new(1)),
            retention,
        }
    }

    /// Mint a fresh job token
    ///
    /// Combines a monotonic sequence number with a random suffix, so tokens
    /// are unique across the registry's lifetime and carry no relation to the
    /// alert id format.
    fn mint_job_id(&self) -> JobId {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let suffix: u32 = rand::random();
        JobId::new(format!("{seq:08}-{suffix:08x}"))
    }

    /// Create a new export job for the alert
    ///
    /// Fails with [`RegistryError::InvalidAlert`] if the artifact store does
    /// not know the alert. On success the job enters `Pending` and the export
    /// task is spawned; the returned token is unique per creation call.
    pub async fn create_job(&self, alert_id: &AlertId) -> Result<JobId, RegistryError> {
        if !self.store.alert_exists(alert_id).await {
            return Err(RegistryError::InvalidAlert(alert_id.clone()));
        }

        let job_id = self.mint_job_id();
        let entry = JobEntry {
            alert_id: alert_id.clone(),
            state: JobState::Pending,
            created_at: Utc::now(),
            failure: None,
            artifact: None,
        };
        self.jobs.write().await.insert(job_id.clone(), entry);

        tracing::info!(alert_id = %alert_id, job_id = %job_id, "export job created");

        // Drive the export off the request path; status responses never wait
        // on the artifact store
        let registry = self.clone();
        let task_alert = alert_id.clone();
        let task_job = job_id.clone();
        tokio::spawn(async move {
            registry.run_export(task_alert, task_job).await;
        });

        Ok(job_id)
    }

    /// Execute one export and record its terminal state
    async fn run_export(&self, alert_id: AlertId, job_id: JobId) {
        if !self.transition(&job_id, JobState::Processing, None, None).await {
            // Closed or purged before the export started
            return;
        }

        match self.store.export(&alert_id).await {
            Ok(payload) => {
                tracing::info!(
                    alert_id = %alert_id,
                    job_id = %job_id,
                    bytes = payload.bytes.len(),
                    "export job complete"
                );
                self.transition(&job_id, JobState::Complete, None, Some(payload))
                    .await;
            }
            Err(message) => {
                tracing::warn!(
                    alert_id = %alert_id,
                    job_id = %job_id,
                    error = %message,
                    "export job failed"
                );
                self.transition(&job_id, JobState::Failed, Some(message), None)
                    .await;
            }
        }
    }

    /// Advance a job's state, enforcing monotonicity
    ///
    /// Returns false if the job is gone or already terminal; terminal states
    /// are never overwritten.
    async fn transition(
        &self,
        job_id: &JobId,
        next: JobState,
        failure: Option<String>,
        artifact: Option<ArtifactPayload>,
    ) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(job_id) else {
            return false;
        };
        if entry.state.is_terminal() {
            return false;
        }

        entry.state = next;
        if failure.is_some() {
            entry.failure = failure;
        }
        if artifact.is_some() {
            entry.artifact = artifact;
        }
        true
    }

    /// Report the status of a job
    ///
    /// Fails with [`RegistryError::UnknownJob`] if the id pair does not
    /// correspond to a live job. One job's state never leaks into another's;
    /// the alert id must match the one the job was created for.
    pub async fn get_status(
        &self,
        alert_id: &AlertId,
        job_id: &JobId,
    ) -> Result<StatusReport, RegistryError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(job_id).filter(|e| &e.alert_id == alert_id).ok_or(
            RegistryError::UnknownJob {
                alert_id: alert_id.clone(),
                job_id: job_id.clone(),
            },
        )?;

        let report = match &entry.state {
            JobState::Pending => StatusReport::InProgress {
                message: Some("export job queued".to_string()),
            },
            JobState::Processing => StatusReport::InProgress {
                message: Some("export job in progress".to_string()),
            },
            JobState::Complete => StatusReport::Complete,
            JobState::Failed => StatusReport::Error {
                message: entry
                    .failure
                    .clone()
                    .unwrap_or_else(|| "export job failed".to_string()),
            },
        };
        Ok(report)
    }

    /// Fetch the artifact of a completed job
    ///
    /// Fails with [`RegistryError::JobNotComplete`] before completion and
    /// [`RegistryError::JobFailed`] after failure. Repeated calls on a
    /// completed job return byte-identical payloads.
    pub async fn get_artifact(
        &self,
        alert_id: &AlertId,
        job_id: &JobId,
    ) -> Result<ArtifactPayload, RegistryError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(job_id).filter(|e| &e.alert_id == alert_id).ok_or(
            RegistryError::UnknownJob {
                alert_id: alert_id.clone(),
                job_id: job_id.clone(),
            },
        )?;

        match &entry.state {
            JobState::Complete => entry.artifact.clone().ok_or(RegistryError::JobNotComplete {
                job_id: job_id.clone(),
            }),
            JobState::Failed => Err(RegistryError::JobFailed {
                job_id: job_id.clone(),
                message: entry
                    .failure
                    .clone()
                    .unwrap_or_else(|| "export job failed".to_string()),
            }),
            JobState::Pending | JobState::Processing => Err(RegistryError::JobNotComplete {
                job_id: job_id.clone(),
            }),
        }
    }

    /// Dispose a job and its artifact
    ///
    /// Invoked by the orchestrator once an export reaches a terminal outcome
    /// so server-side resources are reclaimed deterministically. Idempotent;
    /// closing an unknown or already-closed job is a no-op.
    pub async fn close_job(&self, alert_id: &AlertId, job_id: &JobId) {
        let mut jobs = self.jobs.write().await;
        if jobs.get(job_id).is_some_and(|e| &e.alert_id == alert_id) {
            jobs.remove(job_id);
            tracing::debug!(alert_id = %alert_id, job_id = %job_id, "export job closed");
        }
    }

    /// Dispose jobs older than the retention window
    ///
    /// Covers clients that abandoned a job without closing it. Returns the
    /// number of jobs disposed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let retention =
            chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|job_id, entry| {
            let keep = entry.created_at + retention > now;
            if !keep {
                tracing::debug!(job_id = %job_id, state = %entry.state, "export job expired");
            }
            keep
        });
        before - jobs.len()
    }

    /// Spawn the background retention sweep
    ///
    /// Runs until the returned handle is aborted (typically alongside server
    /// shutdown).
    pub fn spawn_retention_sweep(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let purged = registry.purge_expired(Utc::now()).await;
                if purged > 0 {
                    tracing::info!(purged, "retention sweep disposed expired export jobs");
                }
            }
        })
    }

    /// Current state of a job, if it is live
    pub async fn job_state(&self, job_id: &JobId) -> Option<JobState> {
        self.jobs.read().await.get(job_id).map(|e| e.state.clone())
    }

    /// Number of live jobs
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}
