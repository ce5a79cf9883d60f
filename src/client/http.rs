//! Wire protocol client for the export API
//!
//! One `ExportClient` wraps a reqwest client with a base URL and a
//! per-request timeout. Artifact responses are discriminated exactly once at
//! this boundary into [`RetrievalOutcome`], so downstream logic never
//! re-inspects content types.

use crate::error::{Error, Result};
use crate::types::{AlertId, ArtifactPayload, JobId, StatusReport};
use reqwest::header;
use std::time::Duration;
use url::Url;

/// A retrieval response decided at the wire boundary
///
/// The discrimination rule: a response whose declared content type is a JSON
/// media type is an error, never capture data, regardless of which path
/// produced it or what the JSON happens to contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Binary artifact plus the filename suggested by the server, if any
    Binary(ArtifactPayload),
    /// Structured error body; carries the server's message
    ErrorBody(String),
}

/// HTTP client for the export wire protocol
#[derive(Clone)]
pub struct ExportClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ExportClient {
    /// Create a client against the given API base URL
    ///
    /// `request_timeout` applies to every individual request; the polling
    /// attempt budget bounds the overall operation separately.
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    /// Build an endpoint URL from path segments, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config {
                message: format!("api_url {} cannot be a base", self.base_url),
                key: Some("api_url".into()),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Create an export job for the alert
    ///
    /// A 404 is the server rejecting the alert itself and maps to
    /// [`Error::InvalidAlert`]; it is fatal and never retried.
    pub async fn create_job(&self, alert_id: &AlertId) -> Result<JobId> {
        let url = self.endpoint(&["alerts", alert_id.as_str(), "export", "job"])?;
        let response = self.http.post(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::InvalidAlert(alert_id.clone()));
        }
        if !status.is_success() {
            let message = error_message_from_body(response).await.unwrap_or_else(|| {
                format!("export job creation failed (status {})", status.as_u16())
            });
            return Err(Error::JobFailed { message });
        }

        let body: serde_json::Value = response.json().await?;
        match body.get("job_id").and_then(|v| v.as_str()) {
            Some(job_id) if !job_id.is_empty() => Ok(JobId::new(job_id)),
            _ => Err(Error::MalformedResponse(
                "job creation body missing `job_id`".into(),
            )),
        }
    }

    /// Query the status of a job
    ///
    /// 200 means complete, 202 still in progress (with an optional message),
    /// 404 an unknown job; any other status is the server reporting the
    /// export as failed.
    pub async fn get_status(&self, alert_id: &AlertId, job_id: &JobId) -> Result<StatusReport> {
        let url = self.endpoint(&[
            "alerts",
            alert_id.as_str(),
            "export",
            "status",
            job_id.as_str(),
        ])?;
        let response = self.http.get(url).send().await?;
        let status = response.status();

        match status {
            reqwest::StatusCode::OK => Ok(StatusReport::Complete),
            reqwest::StatusCode::ACCEPTED => {
                let message = status_message_from_body(response).await;
                Ok(StatusReport::InProgress { message })
            }
            reqwest::StatusCode::NOT_FOUND => Err(Error::UnknownJob {
                alert_id: alert_id.clone(),
                job_id: job_id.clone(),
            }),
            other => {
                let message = status_message_from_body(response)
                    .await
                    .unwrap_or_else(|| format!("export job failed (status {})", other.as_u16()));
                Ok(StatusReport::Error { message })
            }
        }
    }

    /// Fetch the artifact of a completed job
    pub async fn fetch_artifact(
        &self,
        alert_id: &AlertId,
        job_id: &JobId,
    ) -> Result<RetrievalOutcome> {
        let url = self.endpoint(&[
            "alerts",
            alert_id.as_str(),
            "export",
            "download",
            job_id.as_str(),
        ])?;
        let response = self.http.get(url).send().await?;
        discriminate(response).await
    }

    /// Fetch the artifact in a single round trip, skipping job creation
    pub async fn fetch_direct(&self, alert_id: &AlertId) -> Result<RetrievalOutcome> {
        let url = self.endpoint(&["alerts", alert_id.as_str(), "export", "direct"])?;
        let response = self.http.get(url).send().await?;
        discriminate(response).await
    }

    /// Dispose a job server-side
    ///
    /// Idempotent; callers treat failures as best-effort and log them rather
    /// than overriding the export's primary outcome.
    pub async fn close_job(&self, alert_id: &AlertId, job_id: &JobId) -> Result<()> {
        let url = self.endpoint(&[
            "alerts",
            alert_id.as_str(),
            "export",
            "job",
            job_id.as_str(),
        ])?;
        self.http.delete(url).send().await?;
        Ok(())
    }
}

/// Apply the content-type discrimination rule to a retrieval response
///
/// A JSON media type is always an error body and must carry an `error`
/// field; anything else is the binary artifact. A JSON body is never written
/// to disk as if it were capture data.
async fn discriminate(response: reqwest::Response) -> Result<RetrievalOutcome> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if is_json_media_type(&content_type) {
        let bytes = response.bytes().await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::MalformedResponse(format!("unparsable JSON error body: {e}")))?;
        return match body.get("error").and_then(|v| v.as_str()) {
            Some(message) => Ok(RetrievalOutcome::ErrorBody(message.to_string())),
            None => Err(Error::MalformedResponse(
                "JSON error body missing `error` field".into(),
            )),
        };
    }

    let filename = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition);

    let bytes = response.bytes().await?;
    Ok(RetrievalOutcome::Binary(ArtifactPayload {
        bytes: bytes.to_vec(),
        filename,
    }))
}

/// Whether a content type declares structured JSON data
fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    essence == "application/json" || essence == "text/json" || essence.ends_with("+json")
}

/// Extract the `filename=` token from a content-disposition style header
///
/// Handles quoted and bare values; returns None when absent or empty so the
/// caller falls back to the fixed default name.
pub(crate) fn filename_from_disposition(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        let lowered = part.to_ascii_lowercase();
        if let Some(idx) = lowered.strip_prefix("filename=").map(|_| "filename=".len()) {
            let raw = part[idx..].trim().trim_matches('"').trim();
            if raw.is_empty() {
                return None;
            }
            return Some(raw.to_string());
        }
    }
    None
}

/// Best-effort extraction of `message` or `error` from a JSON body
async fn status_message_from_body(response: reqwest::Response) -> Option<String> {
    let body: serde_json::Value = response.json().await.ok()?;
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Best-effort extraction of `error` from a JSON body
async fn error_message_from_body(response: reqwest::Response) -> Option<String> {
    let body: serde_json::Value = response.json().await.ok()?;
    body.get("error").and_then(|v| v.as_str()).map(str::to_string)
}
