//! JSON error responses.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::extract::ExtractionError;
use crate::services::LifecycleError;

const INTERNAL_MESSAGE: &str = "Something went wrong!";

/// An error rendered as `{ "error": … }`, with `message` carrying detail
/// for internal errors when dev mode is on.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            detail: None,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// A 500 that only reveals `detail` in dev mode.
    pub fn internal(summary: &str, detail: impl ToString, dev_mode: bool) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: summary.to_string(),
            detail: dev_mode.then(|| detail.to_string()),
        }
    }

    /// Map a lifecycle failure to a response.
    pub fn from_lifecycle(err: LifecycleError, dev_mode: bool) -> Self {
        match err {
            LifecycleError::EmptyExtraction => Self::bad_request(err.to_string()),
            LifecycleError::Extraction(ExtractionError::UnsupportedFormat(_)) => {
                Self::bad_request(err.to_string())
            }
            LifecycleError::Extraction(ExtractionError::ExtractionFailed(_)) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            LifecycleError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "Document not found"),
            LifecycleError::AnalysisInProgress(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            LifecycleError::Analysis(e) => {
                tracing::error!("Analysis failed: {}", e);
                Self::internal("Analysis failed", e, dev_mode)
            }
            LifecycleError::Database(_) | LifecycleError::Task(_) => {
                tracing::error!("Request failed: {}", err);
                Self::internal(INTERNAL_MESSAGE, err, dev_mode)
            }
        }
    }

    /// Map a multipart read failure, keeping axum's status (413 for oversize bodies).
    pub fn from_multipart(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.detail {
            Some(detail) => serde_json::json!({ "error": self.error, "message": detail }),
            None => serde_json::json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}
