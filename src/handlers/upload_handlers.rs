//! HTTP handlers for the upload endpoints.
//!
//! Request files are spooled to an anonymous temp file so the pipeline gets
//! an exact length without holding the whole body in memory. Batch endpoints
//! answer with one outcome per item and never abort on a single failure.

use crate::{
    errors::AppError,
    models::{
        object::StoredObjectReference,
        requests::{
            Base64FileUploadRequest, MultiBase64FileUploadRequest, UploadOutcome,
            UrlPathUploadRequest, UrlsPathUploadRequest,
        },
    },
    services::{
        error_classifier::{ErrorKind, GatewayError},
        sources::{DEFAULT_CONTENT_TYPE, UploadSource},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Path, State,
        multipart::{Field, Multipart, MultipartError},
    },
};
use std::io::SeekFrom;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

const FILE_FIELD: &str = "file";
const PATH_FIELD: &str = "destinationPath";

/// Parsed multipart form: every `file` part plus the optional destination.
#[derive(Default)]
struct UploadForm {
    files: Vec<UploadSource>,
    destination_path: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(FILE_FIELD) => {
                    let source = spool(field).await?;
                    form.files.push(source);
                }
                Some(PATH_FIELD) => {
                    form.destination_path = Some(field.text().await.map_err(multipart_error)?);
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn first_file(self) -> Result<UploadSource, AppError> {
        self.files
            .into_iter()
            .find(|source| !is_empty_file(source))
            .ok_or_else(|| AppError::bad_request("No file uploaded."))
    }

    /// Non-empty files; empty parts are skipped.
    fn files(self) -> Result<Vec<UploadSource>, AppError> {
        let files: Vec<_> = self
            .files
            .into_iter()
            .filter(|source| !is_empty_file(source))
            .collect();
        if files.is_empty() {
            return Err(AppError::bad_request("No files uploaded."));
        }
        Ok(files)
    }
}

fn is_empty_file(source: &UploadSource) -> bool {
    matches!(source, UploadSource::Direct { length: 0, .. })
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), ErrorKind::Validation, err.body_text())
}

fn spool_error(err: std::io::Error) -> AppError {
    error!(error = %err, "spooling upload to temp file failed");
    AppError::from(GatewayError::Internal)
}

/// Copy one multipart file part into an unlinked temp file and hand it back
/// as a stream of known length.
async fn spool(mut field: Field<'_>) -> Result<UploadSource, AppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let spool = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|err| spool_error(std::io::Error::other(err)))?
        .map_err(spool_error)?;
    let mut spool = tokio::fs::File::from_std(spool);

    let mut length = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        spool.write_all(&chunk).await.map_err(spool_error)?;
        length += chunk.len() as u64;
    }
    spool.flush().await.map_err(spool_error)?;
    spool.seek(SeekFrom::Start(0)).await.map_err(spool_error)?;
    debug!(%file_name, length, "spooled upload");

    Ok(UploadSource::Direct {
        file_name,
        content_type,
        length,
        body: Box::pin(ReaderStream::new(spool)),
    })
}

fn required_path(path: Option<String>) -> Result<String, AppError> {
    path.filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Destination path must be provided."))
}

fn remote_sources(urls: Vec<String>) -> Result<Vec<UploadSource>, AppError> {
    let sources: Vec<_> = urls
        .into_iter()
        .filter(|url| !url.trim().is_empty())
        .map(|url| UploadSource::Remote { url })
        .collect();
    if sources.is_empty() {
        return Err(AppError::bad_request("No URLs provided."));
    }
    Ok(sources)
}

fn outcomes(results: Vec<Result<StoredObjectReference, GatewayError>>) -> Json<Vec<UploadOutcome>> {
    Json(results.into_iter().map(UploadOutcome::from).collect())
}

/// POST `/{bucket}` — multipart `file`.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    multipart: Multipart,
) -> Result<Json<StoredObjectReference>, AppError> {
    let source = UploadForm::read(multipart).await?.first_file()?;
    Ok(Json(state.uploads.upload(&bucket, "", source).await?))
}

/// POST `/{bucket}/to-path` — multipart `file` + `destinationPath`.
pub async fn upload_file_to_path(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    multipart: Multipart,
) -> Result<Json<StoredObjectReference>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let path = required_path(form.destination_path.take())?;
    let source = form.first_file()?;
    Ok(Json(state.uploads.upload(&bucket, &path, source).await?))
}

/// POST `/multiple/{bucket}` — many `file` parts.
pub async fn upload_files(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    multipart: Multipart,
) -> Result<Json<Vec<UploadOutcome>>, AppError> {
    let files = UploadForm::read(multipart).await?.files()?;
    Ok(outcomes(state.uploads.upload_all(&bucket, "", files).await))
}

/// POST `/multiple/{bucket}/to-path`
pub async fn upload_files_to_path(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    multipart: Multipart,
) -> Result<Json<Vec<UploadOutcome>>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let path = required_path(form.destination_path.take())?;
    let files = form.files()?;
    Ok(outcomes(state.uploads.upload_all(&bucket, &path, files).await))
}

/// POST `/from-url/{bucket}` — body is a JSON string.
pub async fn upload_from_url(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Json(url): Json<String>,
) -> Result<Json<StoredObjectReference>, AppError> {
    if url.trim().is_empty() {
        return Err(AppError::bad_request("No URL provided."));
    }
    let source = UploadSource::Remote { url };
    Ok(Json(state.uploads.upload(&bucket, "", source).await?))
}

/// POST `/from-url/{bucket}/to-path`
pub async fn upload_from_url_to_path(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Json(req): Json<UrlPathUploadRequest>,
) -> Result<Json<StoredObjectReference>, AppError> {
    if req.url.trim().is_empty() {
        return Err(AppError::bad_request("No URL provided."));
    }
    let path = required_path(Some(req.destination_path))?;
    let source = UploadSource::Remote { url: req.url };
    Ok(Json(state.uploads.upload(&bucket, &path, source).await?))
}

/// POST `/from-urls/{bucket}` — body is a JSON array of URLs.
pub async fn upload_from_urls(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Json(urls): Json<Vec<String>>,
) -> Result<Json<Vec<UploadOutcome>>, AppError> {
    let sources = remote_sources(urls)?;
    Ok(outcomes(state.uploads.upload_all(&bucket, "", sources).await))
}

/// POST `/from-urls/{bucket}/to-path`
pub async fn upload_from_urls_to_path(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Json(req): Json<UrlsPathUploadRequest>,
) -> Result<Json<Vec<UploadOutcome>>, AppError> {
    let path = required_path(Some(req.destination_path))?;
    let sources = remote_sources(req.urls)?;
    Ok(outcomes(state.uploads.upload_all(&bucket, &path, sources).await))
}

/// POST `/from-base64/{bucket}`
pub async fn upload_from_base64(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Json(req): Json<Base64FileUploadRequest>,
) -> Result<Json<StoredObjectReference>, AppError> {
    if req.file_base64_as_string.trim().is_empty() {
        return Err(AppError::bad_request("No Base64 string provided."));
    }
    let source = UploadSource::Base64 {
        data: req.file_base64_as_string,
        extension: req.file_extension,
    };
    Ok(Json(state.uploads.upload(&bucket, "", source).await?))
}

/// POST `/from-multi-base64/{bucket}`
pub async fn upload_from_multi_base64(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Json(req): Json<MultiBase64FileUploadRequest>,
) -> Result<Json<Vec<UploadOutcome>>, AppError> {
    let sources: Vec<_> = req
        .files
        .into_iter()
        .filter(|file| !file.file_base64_as_string.trim().is_empty())
        .map(|file| UploadSource::Base64 {
            data: file.file_base64_as_string,
            extension: file.file_extension,
        })
        .collect();
    if sources.is_empty() {
        return Err(AppError::bad_request("No Base64 files provided."));
    }
    Ok(outcomes(state.uploads.upload_all(&bucket, "", sources).await))
}
