use crate::{services::ingest_service::IngestService, storage::LocalObjectStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ingest: IngestService,

    /// Set when assets live on local disk and are served by this process.
    pub assets: Option<LocalObjectStore>,
}
