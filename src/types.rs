//! Core types for evidence-dl

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opaque identifier for a security alert
///
/// Alerts are owned by the upstream analytics service; this crate only ever
/// scopes export jobs to them and never mutates them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AlertId(pub String);

impl AlertId {
    /// Create a new AlertId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AlertId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AlertId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token identifying one export job
///
/// Issued by the job registry on creation; unique per creation call and never
/// reused, even after the job has been disposed. The format is unrelated to
/// the alert id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-side export job state
///
/// Transitions are monotonic: `Pending → Processing → Complete | Failed`.
/// `Complete` and `Failed` are terminal; no transition ever leaves them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created, export not yet started
    Pending,
    /// Artifact store is producing the export
    Processing,
    /// Artifact is available for download
    Complete,
    /// Export failed with a server-side reason
    Failed,
}

impl JobState {
    /// Whether this state is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Discriminated status of one export job as reported by the status protocol
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusReport {
    /// Export finished; the artifact can be fetched
    Complete,
    /// Export still running; optional human-readable progress message
    InProgress {
        /// Latest server progress message, surfaced for observability
        message: Option<String>,
    },
    /// Export failed with a server-supplied reason
    Error {
        /// Server failure message, surfaced to the caller verbatim
        message: String,
    },
}

/// The binary export product: opaque bytes plus a suggested filename
///
/// Never persisted by the client; the payload exists only for the duration of
/// one delivery operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPayload {
    /// Raw capture bytes
    pub bytes: Vec<u8>,
    /// Filename suggested by the producer, if any
    pub filename: Option<String>,
}

impl ArtifactPayload {
    /// Create a payload with a suggested filename
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: Some(filename.into()),
        }
    }

    /// Create a payload without a suggested filename
    pub fn unnamed(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: None,
        }
    }
}

/// Retrieval strategy chosen per export invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Create a job, poll status on a fixed cadence, then download
    Queued,
    /// Single-round-trip retrieval for exports fast enough to serve inline
    Direct,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Queued => write!(f, "queued"),
            Strategy::Direct => write!(f, "direct"),
        }
    }
}

/// Event emitted during an export lifecycle
///
/// Consumers subscribe via [`crate::EvidenceExporter::subscribe`]; emission is
/// best-effort and never blocks the export pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A queued export job was registered server-side
    JobCreated {
        /// Alert the export is scoped to
        alert_id: AlertId,
        /// Token issued by the registry
        job_id: JobId,
    },

    /// A status poll observed the job still in progress
    Progress {
        /// Alert the export is scoped to
        alert_id: AlertId,
        /// Token issued by the registry
        job_id: JobId,
        /// 1-based poll attempt number
        attempt: u32,
        /// Latest server progress message, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The artifact was written to disk
    Delivered {
        /// Alert the export is scoped to
        alert_id: AlertId,
        /// Final filename of the delivered artifact
        filename: String,
    },

    /// The export terminated without delivering an artifact
    ExportFailed {
        /// Alert the export is scoped to
        alert_id: AlertId,
        /// Human-readable failure description
        error: String,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_terminality() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(JobState::Complete.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn alert_id_serializes_transparently() {
        let id = AlertId::new("A1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"A1\"");

        let back: AlertId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn job_id_display_matches_inner() {
        let id = JobId::new("00000001-deadbeef");
        assert_eq!(id.to_string(), "00000001-deadbeef");
        assert_eq!(id.as_str(), "00000001-deadbeef");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Delivered {
            alert_id: AlertId::new("A1"),
            filename: "cap.pcapng".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "delivered");
        assert_eq!(json["filename"], "cap.pcapng");
    }

    #[test]
    fn progress_event_omits_absent_message() {
        let event = Event::Progress {
            alert_id: AlertId::new("A1"),
            job_id: JobId::new("J1"),
            attempt: 3,
            message: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("message").is_none());
        assert_eq!(json["attempt"], 3);
    }
}
