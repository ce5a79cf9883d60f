//! Client-side export orchestration (decomposed into focused submodules)
//!
//! - [`http`] - Wire protocol client and response discrimination
//! - [`poller`] - Bounded fixed-cadence status polling
//! - [`delivery`] - Artifact delivery with scoped temp handles
//! - [`guard`] - Per-(alert, strategy) duplicate-invocation guard

pub mod delivery;
pub mod http;
pub(crate) mod guard;
pub(crate) mod poller;

pub use delivery::{DEFAULT_ARTIFACT_NAME, Delivered};
pub use http::{ExportClient, RetrievalOutcome};
