//! HTTP handlers for the download endpoints.
//!
//! Object paths arrive as a single percent-encoded segment
//! (`docs%2Freport.pdf`). Handlers take the segment still encoded and the
//! download service decodes it exactly once.

use crate::{
    errors::AppError,
    models::{
        object::{FileContent, FileMetadata, RangedContent},
        range::ByteRange,
        requests::{ByteArrayFileContent, ListQuery, PresignedUrlQuery},
    },
    services::object_key::decode_key,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, RawPathParams, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use base64::{Engine as _, engine::general_purpose};

const DEFAULT_PRESIGN_MINUTES: u32 = 60;

/// Bucket (decoded) and object path (still percent-encoded) from the route.
fn object_location(params: &RawPathParams) -> (String, String) {
    let mut bucket = String::new();
    let mut path = String::new();
    for (name, value) in params {
        match name {
            "bucket" => bucket = decode_key(value),
            "path" => path = value.to_string(),
            _ => {}
        }
    }
    (bucket, path)
}

fn set_file_headers(headers: &mut HeaderMap, content_type: &str, file_name: &str) {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    let disposition = HeaderValue::from_str(&content_disposition(file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
}

/// `attachment` with a quoted ASCII `filename` and, for non-ASCII names, an
/// RFC 6266 `filename*` carrying the UTF-8 original.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => format!("\\{c}"),
            c if c.is_ascii() && !c.is_ascii_control() => c.to_string(),
            _ => "_".to_string(),
        })
        .collect();
    if file_name.is_ascii() {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(file_name)
        )
    }
}

fn file_response(file: FileContent) -> Response {
    let mut response = Response::new(Body::from(file.content));
    set_file_headers(response.headers_mut(), &file.content_type, &file.file_name);
    response
}

/// GET `/{bucket}/{path}` — whole object as an attachment.
pub async fn get_file(
    State(state): State<AppState>,
    params: RawPathParams,
) -> Result<Response, AppError> {
    let (bucket, path) = object_location(&params);
    let file = state.downloads.fetch_file(&bucket, &path).await?;
    Ok(file_response(file))
}

/// GET `/{bucket}/{path}/byteArray` — base64 content in JSON.
pub async fn get_file_as_byte_array(
    State(state): State<AppState>,
    params: RawPathParams,
) -> Result<Json<ByteArrayFileContent>, AppError> {
    let (bucket, path) = object_location(&params);
    let file = state.downloads.fetch_file(&bucket, &path).await?;
    Ok(Json(ByteArrayFileContent {
        content: general_purpose::STANDARD.encode(&file.content),
        content_type: file.content_type,
        file_name: file.file_name,
    }))
}

/// GET `/{bucket}/{path}/stream` — chunked body.
pub async fn get_file_as_stream(
    State(state): State<AppState>,
    params: RawPathParams,
) -> Result<Response, AppError> {
    let (bucket, path) = object_location(&params);
    let ranged = state.downloads.fetch_ranged(&bucket, &path).await?;
    let content_type = ranged.content_type().to_string();
    let file_name = ranged.file_name().to_string();

    let mut response = Response::new(Body::from_stream(ranged.into_stream()));
    set_file_headers(response.headers_mut(), &content_type, &file_name);
    Ok(response)
}

/// GET `/{bucket}/{path}/partial` — honours a single `Range: bytes=` request.
pub async fn get_file_partial(
    State(state): State<AppState>,
    params: RawPathParams,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (bucket, path) = object_location(&params);
    let ranged = state.downloads.fetch_ranged(&bucket, &path).await?;
    let requested = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(ByteRange::parse);
    Ok(partial_response(ranged, requested))
}

fn partial_response(ranged: RangedContent, requested: Option<ByteRange>) -> Response {
    let total = ranged.len();
    let Some(requested) = requested else {
        let mut response = Response::new(Body::from_stream(ranged.clone().into_stream()));
        set_file_headers(response.headers_mut(), ranged.content_type(), ranged.file_name());
        response
            .headers_mut()
            .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(total));
        return response;
    };

    match requested.resolve(total) {
        Ok(range) => {
            let slice = ranged.slice(&range);
            let mut response = Response::new(Body::from_stream(RangedContent::chunked(slice)));
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            let headers = response.headers_mut();
            set_file_headers(headers, ranged.content_type(), ranged.file_name());
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.len()));
            if let Ok(value) = HeaderValue::from_str(&range.content_range()) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            response
        }
        Err(unsatisfiable) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            let headers = response.headers_mut();
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            if let Ok(value) =
                HeaderValue::from_str(&format!("bytes */{}", unsatisfiable.total_size))
            {
                headers.insert(header::CONTENT_RANGE, value);
            }
            response
        }
    }
}

/// GET `/{bucket}/{path}/metadata`
pub async fn get_file_metadata(
    State(state): State<AppState>,
    params: RawPathParams,
) -> Result<Json<FileMetadata>, AppError> {
    let (bucket, path) = object_location(&params);
    Ok(Json(state.downloads.fetch_metadata(&bucket, &path).await?))
}

/// GET `/{bucket}/{path}/presignedUrl?expiresInMinutes=`
pub async fn get_presigned_url(
    State(state): State<AppState>,
    params: RawPathParams,
    Query(q): Query<PresignedUrlQuery>,
) -> Result<Json<String>, AppError> {
    let (bucket, path) = object_location(&params);
    let minutes = q.expires_in_minutes.unwrap_or(DEFAULT_PRESIGN_MINUTES);
    let url = state
        .downloads
        .presigned_url(&bucket, &path, minutes)
        .await?;
    Ok(Json(url))
}

/// GET `/{bucket}/list?prefix=`
pub async fn list_files(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.downloads.list_files(&bucket, &q.prefix).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn content() -> RangedContent {
        RangedContent::new(FileContent {
            content: Bytes::from_static(b"0123456789"),
            content_type: "text/plain".into(),
            file_name: "digits.txt".into(),
        })
    }

    #[test]
    fn no_range_serves_everything_and_advertises_ranges() {
        let response = partial_response(content(), None);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
    }

    #[test]
    fn satisfiable_range_is_206() {
        let response = partial_response(content(), ByteRange::parse("bytes=2-4"));
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-4/10");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
    }

    #[test]
    fn range_past_the_end_is_416() {
        let response = partial_response(content(), ByteRange::parse("bytes=50-"));
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */10");
    }

    #[test]
    fn non_ascii_names_get_an_encoded_filename_parameter() {
        let mut headers = HeaderMap::new();
        set_file_headers(&mut headers, "application/pdf", "é.pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"_.pdf\"; filename*=UTF-8''%C3%A9.pdf"
        );
    }

    #[test]
    fn disposition_escapes_quotes() {
        let mut headers = HeaderMap::new();
        set_file_headers(&mut headers, "text/plain", "say \"hi\".txt");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"say \\\"hi\\\".txt\""
        );
    }
}
