//! Uploaded transcript documents and their analysis state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AnalysisResult;

/// Processing stage of a document.
///
/// `Uploaded -> Processing -> Completed | Failed`. A failed document may be
/// claimed for processing again; nothing moves back to `Uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Statuses from which an analysis may be started.
    pub fn claimable() -> [Self; 2] {
        [Self::Uploaded, Self::Failed]
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transcript accepted for analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    /// Filesystem-safe form of the upload name.
    pub filename: String,
    /// Upload name exactly as the client sent it.
    pub original_name: String,
    /// Accepted MIME type.
    pub file_type: String,
    /// Size of the uploaded buffer in bytes.
    pub file_size: u64,
    pub upload_date: DateTime<Utc>,
    /// Whitespace-normalized extracted text.
    pub text_content: Option<String>,
    /// Present only while `status` is `Completed`.
    pub analysis_result: Option<AnalysisResult>,
    pub status: DocumentStatus,
}

impl Document {
    /// Create a freshly uploaded document with a new id.
    pub fn new(original_name: &str, file_type: &str, file_size: u64, text_content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: sanitize_filename(original_name),
            original_name: original_name.to_string(),
            file_type: file_type.to_string(),
            file_size,
            upload_date: Utc::now(),
            text_content: Some(text_content),
            analysis_result: None,
            status: DocumentStatus::Uploaded,
        }
    }

    /// Whether there is extracted text to analyze.
    pub fn has_text(&self) -> bool {
        self.text_content
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// Replace characters that are unsafe in filenames and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}
