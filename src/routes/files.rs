use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::blob::{BlobError, NewBlob};
use crate::envelope::{self, ApiResponse};
use crate::error::AppError;
use crate::state::SharedState;

const FILE_FIELD: &str = "file";

/// Multipart framing overhead allowed on top of the file size limit.
const MULTIPART_SLACK: u64 = 64 * 1024;

/// RFC 5987 `attr-char`: everything else is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub length: i64,
}

/// Declared part type, else a guess from the extension.
fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared {
        Some(ct) if !ct.trim().is_empty() => ct.to_string(),
        _ => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Client filename with control characters removed; Postgres text rejects NUL.
fn clean_filename(raw: Option<&str>) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn multipart_error(err: multer::Error, max_upload_size: usize) -> BlobError {
    match err {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            BlobError::TooLarge(max_upload_size)
        }
        other => BlobError::Source(other.to_string()),
    }
}

pub async fn upload(
    auth: AuthUser,
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Body,
) -> Result<ApiResponse<UploadResponse>, AppError> {
    let store = state.blobs()?;

    let boundary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| AppError::BadRequest("Expected a multipart/form-data body".to_string()))?;

    let max_upload_size = state.config.max_upload_size;
    let constraints = multer::Constraints::new().size_limit(
        multer::SizeLimit::new()
            .whole_stream((max_upload_size as u64).saturating_add(MULTIPART_SLACK)),
    );
    let mut multipart =
        multer::Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from(multipart_error(e, max_upload_size)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = clean_filename(field.file_name());
        let content_type =
            resolve_content_type(field.content_type().map(|m| m.as_ref()), &filename);

        let blob = store
            .upload_from_stream(
                NewBlob {
                    filename: &filename,
                    content_type: &content_type,
                    uploaded_by: auth.user_id,
                },
                field.map_err(|e| multipart_error(e, max_upload_size)),
            )
            .await?;

        tracing::info!(
            file_id = %blob.id,
            user_id = %auth.user_id,
            length = blob.length,
            content_type = %blob.content_type,
            "File uploaded"
        );

        return Ok(envelope::ok(UploadResponse {
            file_id: blob.id,
            file_name: blob.filename,
            content_type: blob.content_type,
            length: blob.length,
        }));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}

pub async fn download(
    _auth: AuthUser,
    State(state): State<SharedState>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let store = state.blobs()?;

    let not_found = || AppError::NotFound("File not found".to_string());
    let id = Uuid::parse_str(&file_id).map_err(|_| not_found())?;
    let blob = store.find(id).await?.ok_or_else(not_found)?;

    let content_type = HeaderValue::from_str(&blob.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&blob.filename))
        .map_err(|e| AppError::Internal(format!("Bad Content-Disposition: {e}")))?;

    let body = Body::from_stream(store.download_stream(&blob));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(blob.length)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback name plus the RFC 5987
/// UTF-8 form.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let encoded = utf8_percent_encode(filename, ATTR_CHAR);

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_name() {
        assert_eq!(
            content_disposition("invoice.pdf"),
            "attachment; filename=\"invoice.pdf\"; filename*=UTF-8''invoice.pdf"
        );
    }

    #[test]
    fn quotes_and_non_ascii_are_escaped() {
        let value = content_disposition("façade \"v2\".txt");
        assert!(value.starts_with("attachment; filename=\"fa_ade _v2_.txt\""));
        assert!(value.ends_with("filename*=UTF-8''fa%C3%A7ade%20%22v2%22.txt"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn control_characters_are_stripped_from_filenames() {
        assert_eq!(clean_filename(Some("in\0voice\r\n.pdf")), "invoice.pdf");
        assert_eq!(clean_filename(Some("\0\0")), "upload");
        assert_eq!(clean_filename(Some("  ")), "upload");
        assert_eq!(clean_filename(None), "upload");
    }

    #[test]
    fn size_overflow_maps_to_too_large() {
        let err = multipart_error(multer::Error::StreamSizeExceeded { limit: 10 }, 8);
        assert!(matches!(err, BlobError::TooLarge(8)));
        assert!(matches!(AppError::from(err), AppError::PayloadTooLarge(_)));
    }

    #[test]
    fn declared_content_type_wins() {
        assert_eq!(resolve_content_type(Some("text/csv"), "data.bin"), "text/csv");
    }

    #[test]
    fn content_type_guessed_from_extension() {
        assert_eq!(resolve_content_type(None, "scan.pdf"), "application/pdf");
        assert_eq!(
            resolve_content_type(None, "no-extension"),
            "application/octet-stream"
        );
    }
}
