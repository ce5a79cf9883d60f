//! Bounded fixed-cadence polling of a job's status
//!
//! The poller issues at most `max_poll_attempts` status queries, one per
//! `poll_interval`, and resolves on the first terminal report. The wait
//! between attempts races against cancellation so a shutdown never blocks on
//! a sleeping interval.

use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::types::{AlertId, Event, JobId, StatusReport};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::http::ExportClient;

/// Poll a job until it completes, fails, or the attempt budget is spent
///
/// Returns `Ok(())` only on a completed job. A server-reported failure maps
/// to [`Error::JobFailed`], an exhausted budget to [`Error::Timeout`], and a
/// triggered token to [`Error::Cancelled`]. Transport errors propagate and
/// abort the poll; the caller decides what that means for the job.
pub(crate) async fn poll_until_complete(
    client: &ExportClient,
    alert_id: &AlertId,
    job_id: &JobId,
    config: &ExportConfig,
    cancel: &CancellationToken,
    events: &broadcast::Sender<Event>,
) -> Result<()> {
    for attempt in 1..=config.max_poll_attempts {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match client.get_status(alert_id, job_id).await? {
            StatusReport::Complete => {
                tracing::info!(alert_id = %alert_id, job_id = %job_id, attempt, "export job complete");
                return Ok(());
            }
            StatusReport::Error { message } => {
                tracing::warn!(alert_id = %alert_id, job_id = %job_id, attempt, error = %message, "export job failed");
                return Err(Error::JobFailed { message });
            }
            StatusReport::InProgress { message } => {
                tracing::debug!(
                    alert_id = %alert_id,
                    job_id = %job_id,
                    attempt,
                    max_attempts = config.max_poll_attempts,
                    "export job still in progress"
                );
                let _ = events.send(Event::Progress {
                    alert_id: alert_id.clone(),
                    job_id: job_id.clone(),
                    attempt,
                    message,
                });
            }
        }

        // No wait after the final attempt; the budget is spent
        if attempt == config.max_poll_attempts {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }

    Err(Error::Timeout {
        attempts: config.max_poll_attempts,
    })
}
