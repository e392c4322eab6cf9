use crate::{
    services::{
        download_service::DownloadService, sources::SourceContext, upload_service::UploadService,
    },
    storage::ObjectBackend,
};
use std::sync::Arc;

/// Shared handles every request handler receives.
#[derive(Clone)]
pub struct AppState {
    pub uploads: UploadService,
    pub downloads: DownloadService,
    pub backend: Arc<dyn ObjectBackend>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        base_url: impl Into<String>,
        sources: SourceContext,
    ) -> Self {
        Self {
            uploads: UploadService::new(backend.clone(), base_url, sources),
            downloads: DownloadService::new(backend.clone()),
            backend,
        }
    }
}
