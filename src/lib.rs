//! # evidence-dl
//!
//! An asynchronous evidence-retrieval pipeline for security alerts. Packet
//! captures for an alert are produced slowly server-side, so retrieval is
//! split into a job lifecycle: a client creates an export job, polls its
//! status on a fixed cadence, downloads the finished artifact, and disposes
//! the job. A direct single-round-trip path exists for exports fast enough
//! to serve inline.
//!
//! ## Quick start
//!
//! ```no_run
//! use evidence_dl::{AlertId, Config, EvidenceExporter};
//!
//! #[tokio::main]
//! async fn main() -> evidence_dl::Result<()> {
//!     let exporter = EvidenceExporter::new(Config::default())?;
//!
//!     let mut events = exporter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let delivered = exporter.export_queued(&AlertId::new("alert-42")).await?;
//!     println!("saved {} ({} bytes)", delivered.path.display(), delivered.bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Running the registry server
//!
//! The server half lives in [`api`] and [`registry`]: plug an
//! [`ArtifactStore`] implementation into a [`JobRegistry`] and serve it with
//! [`api::start_api_server`]. The bundled [`FixtureStore`] backs the test
//! suites and local development.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod exporter;
pub mod registry;
pub mod store;
pub mod types;

pub use client::{DEFAULT_ARTIFACT_NAME, Delivered, ExportClient, RetrievalOutcome};
pub use config::{Config, ExportConfig, ServerConfig};
pub use error::{Error, ErrorBody, RegistryError, Result, ToHttpStatus};
pub use exporter::EvidenceExporter;
pub use registry::JobRegistry;
pub use store::{ArtifactStore, FixtureStore};
pub use types::{AlertId, ArtifactPayload, Event, JobId, JobState, StatusReport, Strategy};
