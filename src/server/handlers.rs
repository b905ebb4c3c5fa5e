//! HTTP request handlers for the documents API.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::error::ApiError;
use super::AppState;
use crate::extract::UploadFormat;
use crate::services::Upload;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "document";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub document_id: String,
    pub filename: String,
}

/// Health check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "message": "Earnings relay API is running",
    }))
}

/// Accept a transcript upload, extract its text and store it.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();

        if UploadFormat::detect(&mime_type, &filename).is_none() {
            return Err(ApiError::bad_request("Only PDF and text files are allowed"));
        }

        let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
        if bytes.len() > state.server.max_upload_bytes {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large",
            ));
        }

        upload = Some(Upload {
            filename,
            mime_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("No file uploaded"));
    }

    let doc = state
        .lifecycle
        .ingest(upload)
        .await
        .map_err(|e| ApiError::from_lifecycle(e, state.server.dev_mode))?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document_id: doc.id,
            filename: doc.original_name,
        }),
    ))
}

/// Run (or return the stored) analysis for a document.
pub async fn analyze_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .lifecycle
        .request_analysis(&document_id)
        .await
        .map_err(|e| ApiError::from_lifecycle(e, state.server.dev_mode))?;

    Ok(Json(serde_json::json!({ "result": result })))
}

/// Fetch a document with its text and analysis.
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = state
        .lifecycle
        .get(&document_id)
        .await
        .map_err(|e| ApiError::from_lifecycle(e, state.server.dev_mode))?;

    Ok(Json(doc))
}
