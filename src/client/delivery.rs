//! Artifact delivery to the download directory
//!
//! Bytes land in a temp file first and are persisted to the final name only
//! once fully written, so a crash mid-write never leaves a truncated capture
//! under the real filename.

use crate::error::{Error, Result};
use crate::types::ArtifactPayload;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Filename used when the server suggests none
pub const DEFAULT_ARTIFACT_NAME: &str = "alert.pcap";

/// A successfully delivered artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Final filename under the download directory
    pub filename: String,
    /// Absolute or configured-relative path of the written file
    pub path: PathBuf,
    /// Size of the written capture in bytes
    pub bytes: usize,
}

/// Write an artifact into the download directory
///
/// Creates the directory if missing. The server-suggested filename is
/// reduced to a bare name; an absent or empty suggestion falls back to
/// [`DEFAULT_ARTIFACT_NAME`]. An existing file of the same name is
/// replaced, matching the idempotent-read semantics of the artifact routes.
pub async fn deliver(payload: ArtifactPayload, download_dir: &Path) -> Result<Delivered> {
    let filename = payload
        .filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string());

    let dir = download_dir.to_path_buf();
    let dest = dir.join(&filename);
    let bytes = payload.bytes;
    let size = bytes.len();

    let written_path = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        let file = tmp.persist(&dest).map_err(|e| e.error)?;
        file.sync_all()?;
        Ok(dest)
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))??;

    tracing::info!(path = %written_path.display(), size, "artifact delivered");

    Ok(Delivered {
        filename,
        path: written_path,
        bytes: size,
    })
}

/// Strip path components and control characters from a suggested filename
fn sanitize_filename(name: &str) -> String {
    let bare = name.rsplit(['/', '\\']).next().unwrap_or(name);
    bare.chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect::<String>()
        .trim()
        .to_string()
}
