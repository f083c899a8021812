use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::WithRejection;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::envelope::{self, ApiResponse};
use crate::error::AppError;
use crate::models::{Blob, FileSlot, NewPulpDocument, PulpDocument};
use crate::state::SharedState;

/// Malformed ids can never match a record, so they are reported as missing.
fn parse_document_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Document not found".to_string()))
}

async fn find_owned(state: &SharedState, auth: &AuthUser, raw_id: &str) -> Result<PulpDocument, AppError> {
    let id = parse_document_id(raw_id)?;
    db::documents::find_by_id_scoped(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
}

pub async fn submit(
    auth: AuthUser,
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<NewPulpDocument>, AppError>,
) -> Result<ApiResponse<PulpDocument>, AppError> {
    req.validate().map_err(AppError::BadRequest)?;

    let document = db::documents::create(&state.pool, auth.user_id, &req).await?;

    tracing::info!(
        document_id = %document.id,
        user_id = %auth.user_id,
        attachments = document.files.referenced().len(),
        "Document submitted"
    );

    Ok(envelope::created(document))
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<PulpDocument>>, AppError> {
    let documents = db::documents::list_for_user(&state.pool, auth.user_id).await?;
    Ok(envelope::ok(documents))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<PulpDocument>, AppError> {
    let document = find_owned(&state, &auth, &id).await?;
    Ok(envelope::ok(document))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAttachment {
    pub slot: FileSlot,
    pub file_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    /// Set when the slot points at a blob that does not exist.
    pub missing: bool,
}

impl SlotAttachment {
    fn resolve(slot: FileSlot, file_id: Option<Uuid>, blobs: &HashMap<Uuid, Blob>) -> Self {
        let blob = file_id.and_then(|id| blobs.get(&id));
        SlotAttachment {
            slot,
            file_id,
            file_name: blob.map(|b| b.filename.clone()),
            content_type: blob.map(|b| b.content_type.clone()),
            length: blob.map(|b| b.length),
            missing: file_id.is_some() && blob.is_none(),
        }
    }
}

/// Resolve each file slot of an owned document against the blob store.
pub async fn files(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<SlotAttachment>>, AppError> {
    let document = find_owned(&state, &auth, &id).await?;
    let store = state.blobs()?;

    let blobs: HashMap<Uuid, Blob> = store
        .find_many(&document.files.referenced())
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    let attachments = document
        .files
        .iter()
        .map(|(slot, file_id)| SlotAttachment::resolve(slot, file_id, &blobs))
        .collect();

    Ok(envelope::ok(attachments))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn blob(id: Uuid) -> Blob {
        Blob {
            id,
            filename: "invoice.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            length: 42,
            chunk_size: 1024,
            sha256: String::new(),
            uploaded_by: Uuid::now_v7(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_slot_is_not_missing() {
        let attachment = SlotAttachment::resolve(FileSlot::ShippingDocs, None, &HashMap::new());
        assert!(!attachment.missing);
        assert!(attachment.file_name.is_none());
    }

    #[test]
    fn dangling_reference_is_flagged() {
        let attachment =
            SlotAttachment::resolve(FileSlot::ShippingDocs, Some(Uuid::now_v7()), &HashMap::new());
        assert!(attachment.missing);
    }

    #[test]
    fn present_blob_carries_metadata() {
        let id = Uuid::now_v7();
        let blobs = HashMap::from([(id, blob(id))]);
        let attachment = SlotAttachment::resolve(FileSlot::DdsSummary, Some(id), &blobs);
        assert!(!attachment.missing);
        assert_eq!(attachment.file_name.as_deref(), Some("invoice.pdf"));
        assert_eq!(attachment.length, Some(42));
    }

    #[test]
    fn malformed_id_reads_as_not_found() {
        assert!(matches!(parse_document_id("abc"), Err(AppError::NotFound(_))));
    }
}
