//! Export protocol route handlers
//!
//! The wire contract: job creation and status speak JSON; the artifact
//! routes return either raw capture bytes with a `Content-Disposition`
//! filename, or a JSON `{error}` body. The content type is the sole
//! discriminator, so a handler never mixes the two in one response.

use crate::api::AppState;
use crate::error::{ErrorBody, RegistryError, ToHttpStatus};
use crate::types::{AlertId, ArtifactPayload, JobId, StatusReport};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Content type of the binary artifact body
pub const PCAP_CONTENT_TYPE: &str = "application/vnd.tcpdump.pcap";

/// Response body for successful job creation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobCreatedBody {
    /// Token of the created job
    pub job_id: JobId,
}

/// Response body for job status queries
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusBody {
    /// Discriminant: "complete", "pending", or "failed"
    pub status: String,

    /// Human-readable progress or failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn registry_error_response(err: &RegistryError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::new(err.to_string()))).into_response()
}

/// POST /alerts/:alert_id/export/job - Create an export job
#[utoipa::path(
    post,
    path = "/alerts/{alert_id}/export/job",
    tag = "export",
    params(
        ("alert_id" = String, Path, description = "Alert identifier")
    ),
    responses(
        (status = 201, description = "Job created", body = JobCreatedBody),
        (status = 404, description = "Alert not found", body = ErrorBody)
    )
)]
pub async fn create_job(State(state): State<AppState>, Path(alert_id): Path<AlertId>) -> Response {
    match state.registry.create_job(&alert_id).await {
        Ok(job_id) => (StatusCode::CREATED, Json(JobCreatedBody { job_id })).into_response(),
        Err(e) => {
            tracing::warn!(alert_id = %alert_id, error = %e, "job creation rejected");
            registry_error_response(&e)
        }
    }
}

/// GET /alerts/:alert_id/export/status/:job_id - Report job status
#[utoipa::path(
    get,
    path = "/alerts/{alert_id}/export/status/{job_id}",
    tag = "export",
    params(
        ("alert_id" = String, Path, description = "Alert identifier"),
        ("job_id" = String, Path, description = "Job token")
    ),
    responses(
        (status = 200, description = "Export complete", body = StatusBody),
        (status = 202, description = "Export still in progress", body = StatusBody),
        (status = 404, description = "Unknown job", body = ErrorBody),
        (status = 500, description = "Export failed", body = StatusBody)
    )
)]
pub async fn job_status(
    State(state): State<AppState>,
    Path((alert_id, job_id)): Path<(AlertId, JobId)>,
) -> Response {
    match state.registry.get_status(&alert_id, &job_id).await {
        Ok(StatusReport::Complete) => (
            StatusCode::OK,
            Json(StatusBody {
                status: "complete".to_string(),
                message: Some("export job complete".to_string()),
            }),
        )
            .into_response(),
        Ok(StatusReport::InProgress { message }) => (
            StatusCode::ACCEPTED,
            Json(StatusBody {
                status: "pending".to_string(),
                message,
            }),
        )
            .into_response(),
        Ok(StatusReport::Error { message }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusBody {
                status: "failed".to_string(),
                message: Some(message),
            }),
        )
            .into_response(),
        Err(e) => registry_error_response(&e),
    }
}

/// GET /alerts/:alert_id/export/download/:job_id - Fetch the artifact
#[utoipa::path(
    get,
    path = "/alerts/{alert_id}/export/download/{job_id}",
    tag = "export",
    params(
        ("alert_id" = String, Path, description = "Alert identifier"),
        ("job_id" = String, Path, description = "Job token")
    ),
    responses(
        (status = 200, description = "Capture bytes with Content-Disposition filename",
            content_type = "application/vnd.tcpdump.pcap"),
        (status = 404, description = "Unknown job", body = ErrorBody),
        (status = 409, description = "Job not complete", body = ErrorBody),
        (status = 500, description = "Job failed", body = ErrorBody)
    )
)]
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((alert_id, job_id)): Path<(AlertId, JobId)>,
) -> Response {
    match state.registry.get_artifact(&alert_id, &job_id).await {
        Ok(payload) => binary_response(&alert_id, payload),
        Err(e) => {
            tracing::warn!(alert_id = %alert_id, job_id = %job_id, error = %e, "artifact fetch rejected");
            registry_error_response(&e)
        }
    }
}

/// GET /alerts/:alert_id/export/direct - Single-round-trip retrieval
///
/// Runs the export inline; only suitable for alerts whose export is fast
/// enough to serve synchronously.
#[utoipa::path(
    get,
    path = "/alerts/{alert_id}/export/direct",
    tag = "export",
    params(
        ("alert_id" = String, Path, description = "Alert identifier")
    ),
    responses(
        (status = 200, description = "Capture bytes with Content-Disposition filename",
            content_type = "application/vnd.tcpdump.pcap"),
        (status = 404, description = "Alert not found", body = ErrorBody),
        (status = 500, description = "Export failed", body = ErrorBody)
    )
)]
pub async fn direct_fetch(
    State(state): State<AppState>,
    Path(alert_id): Path<AlertId>,
) -> Response {
    if !state.store.alert_exists(&alert_id).await {
        return registry_error_response(&RegistryError::InvalidAlert(alert_id));
    }

    match state.store.export(&alert_id).await {
        Ok(payload) => binary_response(&alert_id, payload),
        Err(message) => {
            tracing::warn!(alert_id = %alert_id, error = %message, "direct export failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(message)),
            )
                .into_response()
        }
    }
}

/// DELETE /alerts/:alert_id/export/job/:job_id - Dispose a job
#[utoipa::path(
    delete,
    path = "/alerts/{alert_id}/export/job/{job_id}",
    tag = "export",
    params(
        ("alert_id" = String, Path, description = "Alert identifier"),
        ("job_id" = String, Path, description = "Job token")
    ),
    responses(
        (status = 204, description = "Job disposed (idempotent)")
    )
)]
pub async fn close_job(
    State(state): State<AppState>,
    Path((alert_id, job_id)): Path<(AlertId, JobId)>,
) -> StatusCode {
    state.registry.close_job(&alert_id, &job_id).await;
    StatusCode::NO_CONTENT
}

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Server is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Build the binary artifact response
///
/// The suggested filename comes from the payload; a payload without one is
/// named after the alert. The filename is reduced to a bare name so the
/// header never carries path components.
fn binary_response(alert_id: &AlertId, payload: ArtifactPayload) -> Response {
    let filename = payload
        .filename
        .as_deref()
        .map(sanitize_header_filename)
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| format!("alert_{alert_id}.pcap"));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PCAP_CONTENT_TYPE),
    );

    let disposition = format!("attachment; filename=\"{filename}\"");
    match HeaderValue::from_str(&disposition) {
        Ok(value) => {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        Err(e) => {
            tracing::warn!(alert_id = %alert_id, error = %e, "unusable filename, omitting disposition");
        }
    }

    (StatusCode::OK, headers, payload.bytes).into_response()
}

/// Strip path components and header-hostile characters from a filename
fn sanitize_header_filename(name: &str) -> String {
    let bare = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    bare.chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_header_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_header_filename("dir\\evidence.pcap"), "evidence.pcap");
        assert_eq!(sanitize_header_filename("cap.pcapng"), "cap.pcapng");
    }

    #[test]
    fn sanitize_drops_quotes_and_control_chars() {
        assert_eq!(sanitize_header_filename("a\"b\r\n.pcap"), "ab.pcap");
    }
}
