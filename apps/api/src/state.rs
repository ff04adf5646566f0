use std::sync::Arc;

use crate::analysis::pipeline::Pipeline;
use crate::stores::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The ingestion pipeline with its collaborators already wired in.
    pub pipeline: Pipeline,
    /// Record store handle for the read-only listing/detail paths.
    pub records: Arc<dyn RecordStore>,
}
