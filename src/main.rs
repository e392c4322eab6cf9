use anyhow::{Context, Result};
use file_gateway::{
    app,
    config::{AppConfig, BackendKind},
    services::sources::SourceContext,
    state::AppState,
    storage::{ObjectBackend, memory::MemoryBackend, s3::S3Backend},
};
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting file-gateway with config: {:?}", cfg);

    // --- Object store ---
    let backend: Arc<dyn ObjectBackend> = match cfg.backend {
        BackendKind::S3 => Arc::new(S3Backend::connect(&cfg.storage).await),
        BackendKind::Memory => {
            tracing::warn!("Using in-memory backend; create buckets before uploading");
            Arc::new(MemoryBackend::new())
        }
    };

    let sources = SourceContext::new(Duration::from_secs(cfg.fetch_timeout_secs))
        .context("building HTTP client for remote fetches")?;
    let state = AppState::new(backend, cfg.storage.base_url.clone(), sources);

    // --- Build router ---
    let app = app(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
