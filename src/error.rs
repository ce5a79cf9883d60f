//! Error types for evidence-dl
//!
//! This module provides the error handling for the library, including:
//! - The client-side error taxonomy for export operations
//! - Server-side registry errors with HTTP status code mapping
//! - The structured JSON error body used on the wire

use crate::types::{AlertId, JobId, Strategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for evidence-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for evidence-dl
///
/// Every error is terminal for the export operation that produced it; none
/// are retried automatically and none are silently swallowed. Each variant
/// carries a human-readable message, server-supplied where one exists.
#[derive(Debug, Error)]
pub enum Error {
    /// The alert id does not correspond to a known alert (fatal, no retry)
    #[error("invalid alert: {0}")]
    InvalidAlert(AlertId),

    /// The (alert, job) pair is not known to the registry
    ///
    /// Indicates client/server desync; fatal, no retry.
    #[error("unknown export job {job_id} for alert {alert_id}")]
    UnknownJob {
        /// Alert the request was scoped to
        alert_id: AlertId,
        /// Job token the registry did not recognize
        job_id: JobId,
    },

    /// The server reported the export as failed (message surfaced verbatim)
    #[error("{message}")]
    JobFailed {
        /// Server-supplied failure reason
        message: String,
    },

    /// The polling attempt budget was exhausted without a terminal state
    ///
    /// Client-side condition; there is no server message to surface.
    #[error("export timed out after {attempts} attempts")]
    Timeout {
        /// Number of status attempts that were made
        attempts: u32,
    },

    /// The caller cancelled the export before it reached a terminal state
    #[error("export cancelled")]
    Cancelled,

    /// A response could not be interpreted under the wire contract
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Transport-level failure (fatal for the current attempt, no retry)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Another export for the same (alert, strategy) is already in flight
    #[error("{strategy} export already in flight for alert {alert_id}")]
    AlreadyInFlight {
        /// Alert with an export in flight
        alert_id: AlertId,
        /// Strategy of the in-flight export
        strategy: Strategy,
    },

    /// Server-side registry error
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// I/O error (artifact delivery)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServer(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "poll_interval")
        key: Option<String>,
    },
}

/// Job-registry errors (server-side contract violations)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The alert does not exist in the artifact store
    #[error("alert {0} not found")]
    InvalidAlert(AlertId),

    /// The (alert, job) pair does not correspond to a live job
    #[error("unknown export job {job_id} for alert {alert_id}")]
    UnknownJob {
        /// Alert the request was scoped to
        alert_id: AlertId,
        /// Job token the registry does not hold
        job_id: JobId,
    },

    /// Artifact requested before the job reached `Complete`
    #[error("export job {job_id} is not complete")]
    JobNotComplete {
        /// Job the artifact was requested for
        job_id: JobId,
    },

    /// The job reached `Failed`; no artifact exists
    #[error("export job {job_id} failed: {message}")]
    JobFailed {
        /// Job that failed
        job_id: JobId,
        /// Reason recorded at failure time
        message: String,
    },
}

/// JSON error body used by every non-binary error response on the wire
///
/// # Example JSON Response
///
/// ```json
/// {"error": "export too large"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message
    pub error: String,
}

impl ErrorBody {
    /// Create a new error body
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for RegistryError {
    fn status_code(&self) -> u16 {
        match self {
            RegistryError::InvalidAlert(_) => 404,
            RegistryError::UnknownJob { .. } => 404,
            // Artifact requested too early: the request conflicts with the
            // job's current state, not with its existence
            RegistryError::JobNotComplete { .. } => 409,
            RegistryError::JobFailed { .. } => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            RegistryError::InvalidAlert(_) => "invalid_alert",
            RegistryError::UnknownJob { .. } => "unknown_job",
            RegistryError::JobNotComplete { .. } => "job_not_complete",
            RegistryError::JobFailed { .. } => "job_failed",
        }
    }
}

impl Error {
    /// Human-readable description shown in place of progress output
    ///
    /// Terminal failures replace the latest progress message with this text;
    /// it is always safe to surface to an end user.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
