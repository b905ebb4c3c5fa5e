//! Document lifecycle: intake, analysis and retrieval.
//!
//! A document is persisted only after its text has been extracted, and an
//! analysis always ends with the document `completed` or `failed`. The
//! analysis itself runs in its own task so a dropped caller cannot leave a
//! document stuck in `processing`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::extract::{ExtractionError, ExtractionMethod, TextExtractor, MIME_PDF, MIME_TEXT};
use crate::llm::{AnalysisClient, LlmError};
use crate::models::{AnalysisResult, Document, DocumentStatus};
use crate::repository::{DieselError, DocumentRepository};

/// Slack added to the client's worst-case run time before a `processing`
/// claim counts as abandoned.
const CLAIM_GRACE: Duration = Duration::from_secs(60);

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("No text could be extracted from the file. The PDF may be corrupted or image-based.")]
    EmptyExtraction,

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Analysis already in progress for document {0}")]
    AnalysisInProgress(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Analysis(#[from] LlmError),

    #[error("Database error: {0}")]
    Database(#[from] DieselError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Ties extraction, persistence and analysis together.
#[derive(Clone)]
pub struct DocumentLifecycle {
    extractor: TextExtractor,
    documents: DocumentRepository,
    client: Arc<AnalysisClient>,
}

impl DocumentLifecycle {
    pub fn new(documents: DocumentRepository, client: Arc<AnalysisClient>) -> Self {
        Self {
            extractor: TextExtractor::new(),
            documents,
            client,
        }
    }

    /// Open the database described by `settings` and build the analysis client.
    pub async fn open(settings: &Settings) -> anyhow::Result<Self> {
        if settings.database_url.is_none() {
            settings.ensure_directories()?;
        }

        let ctx = settings.create_db_context();
        ctx.init_schema().await?;

        if settings.llm.credential().is_none() {
            warn!(
                "No {} API key configured; analysis requests will fail",
                settings.llm.provider.as_str()
            );
        }
        let client = AnalysisClient::new(settings.llm.clone())?;

        Ok(Self::new(ctx.documents(), Arc::new(client)))
    }

    /// Extract text from an upload and persist it as an `uploaded` document.
    ///
    /// Nothing is stored when extraction fails or yields no text.
    pub async fn ingest(&self, upload: Upload) -> Result<Document, LifecycleError> {
        let extractor = self.extractor;
        let Upload {
            filename,
            mime_type,
            bytes,
        } = upload;
        let file_size = bytes.len() as u64;

        let (extracted, filename) = tokio::task::spawn_blocking(move || {
            let result = extractor.extract(&bytes, &mime_type, &filename);
            (result, filename)
        })
        .await
        .map_err(|e| LifecycleError::Task(e.to_string()))?;
        let extracted = extracted?;

        if extracted.text.is_empty() {
            warn!("No text extracted from {}", filename);
            return Err(LifecycleError::EmptyExtraction);
        }

        let file_type = match extracted.method {
            ExtractionMethod::PdfText => MIME_PDF,
            ExtractionMethod::PlainText => MIME_TEXT,
        };
        let doc = Document::new(&filename, file_type, file_size, extracted.text);
        self.documents.insert(&doc).await?;

        info!(
            "Ingested {} as {} ({} bytes, {} chars)",
            filename,
            doc.id,
            file_size,
            doc.text_content.as_deref().map_or(0, str::len)
        );
        Ok(doc)
    }

    /// Analyze a document, returning the stored analysis if it already has one.
    pub async fn request_analysis(&self, id: &str) -> Result<AnalysisResult, LifecycleError> {
        let doc = self.get(id).await?;

        let claimed = match doc.status {
            DocumentStatus::Completed => match doc.analysis_result {
                Some(result) => return Ok(result),
                None => {
                    warn!("Completed document {} has no readable analysis, resetting", id);
                    self.documents.mark_failed(id).await?;
                    false
                }
            },
            DocumentStatus::Processing => {
                if !self.reclaim_if_abandoned(id).await? {
                    return Err(LifecycleError::AnalysisInProgress(id.to_string()));
                }
                true
            }
            DocumentStatus::Uploaded | DocumentStatus::Failed => false,
        };

        if !doc.has_text() {
            if claimed {
                self.documents.mark_failed(id).await?;
            }
            return Err(LifecycleError::EmptyExtraction);
        }

        if !claimed && !self.documents.claim_for_analysis(id).await? {
            return Err(LifecycleError::AnalysisInProgress(id.to_string()));
        }

        let this = self.clone();
        let doc_id = id.to_string();
        let text = doc.text_content.unwrap_or_default();
        let outcome = tokio::spawn(async move { this.run_analysis(&doc_id, &text).await }).await;

        match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("Analysis task for {} aborted: {}", id, e);
                self.documents.mark_failed(id).await?;
                Err(LifecycleError::Task(e.to_string()))
            }
        }
    }

    /// Take over a `processing` claim older than any live analysis could be.
    async fn reclaim_if_abandoned(&self, id: &str) -> Result<bool, LifecycleError> {
        let window = self.client.max_run_time() + CLAIM_GRACE;
        let stale_before = Utc::now() - chrono::Duration::seconds(window.as_secs() as i64);

        let reclaimed = self.documents.reclaim_stale(id, stale_before).await?;
        if reclaimed {
            warn!("Document {} was abandoned in processing, analyzing again", id);
        }
        Ok(reclaimed)
    }

    /// Analyze a claimed document and record the outcome.
    async fn run_analysis(&self, id: &str, text: &str) -> Result<AnalysisResult, LifecycleError> {
        let result = match self.client.analyze(text).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Analysis of {} failed: {}", id, e);
                self.documents.mark_failed(id).await?;
                return Err(e.into());
            }
        };

        match self.documents.complete(id, &result).await {
            Ok(true) => {
                info!("Document {} analysis completed", id);
                Ok(result)
            }
            Ok(false) => {
                warn!("Document {} left processing before its analysis was stored", id);
                Ok(result)
            }
            Err(e) => {
                error!("Failed to store analysis for {}: {}", id, e);
                if let Err(e) = self.documents.mark_failed(id).await {
                    error!("Failed to mark {} as failed: {}", id, e);
                }
                Err(e.into())
            }
        }
    }

    /// Load a document.
    pub async fn get(&self, id: &str) -> Result<Document, LifecycleError> {
        self.documents
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    /// Most recent documents, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Document>, LifecycleError> {
        Ok(self.documents.recent(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::build_test_pdf;
    use crate::llm::testing::{test_config, ScriptedProvider, VALID_ANALYSIS};
    use crate::models::Sentiment;
    use crate::repository::{AsyncSqlitePool, DbContext};
    use crate::schema::documents;
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    struct Fixture {
        lifecycle: DocumentLifecycle,
        repo: DocumentRepository,
        provider: Arc<ScriptedProvider>,
        db_path: PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn open_lifecycle(
        db_path: &Path,
        provider: Arc<ScriptedProvider>,
        api_key: Option<&str>,
    ) -> DocumentLifecycle {
        let ctx = DbContext::from_path(db_path);
        ctx.init_schema().await.unwrap();

        let mut config = test_config(&["m1", "m2"]);
        config.api_key = api_key.map(str::to_string);
        let client = AnalysisClient::with_provider(config, provider);
        DocumentLifecycle::new(ctx.documents(), Arc::new(client))
    }

    async fn setup(provider: ScriptedProvider, api_key: Option<&str>) -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let provider = Arc::new(provider);
        let lifecycle = open_lifecycle(&db_path, provider.clone(), api_key).await;

        Fixture {
            lifecycle,
            repo: DbContext::from_path(&db_path).documents(),
            provider,
            db_path,
            _dir: dir,
        }
    }

    /// Overwrite raw columns, standing in for a crash or an old row.
    async fn set_columns(
        db_path: &Path,
        id: &str,
        updated_at: Option<&str>,
        analysis: Option<&str>,
    ) {
        let mut conn = AsyncSqlitePool::from_path(db_path).get().await.unwrap();
        if let Some(updated_at) = updated_at {
            diesel::update(documents::table.find(id))
                .set(documents::updated_at.eq(updated_at))
                .execute(&mut conn)
                .await
                .unwrap();
        }
        if let Some(analysis) = analysis {
            diesel::update(documents::table.find(id))
                .set(documents::analysis_result.eq(analysis))
                .execute(&mut conn)
                .await
                .unwrap();
        }
    }

    fn text_upload(name: &str, body: &str) -> Upload {
        Upload {
            filename: name.to_string(),
            mime_type: "text/plain".to_string(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_ingest_text_persists_uploaded_document() {
        let fx = setup(ScriptedProvider::new(), Some("k")).await;

        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "  CEO:\n record   quarter "))
            .await
            .unwrap();

        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert_eq!(doc.text_content.as_deref(), Some("CEO: record quarter"));
        assert_eq!(doc.file_type, "text/plain");
        assert_eq!(doc.file_size, 25);

        let stored = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(stored, doc);
    }

    #[tokio::test]
    async fn test_ingest_pdf() {
        let fx = setup(ScriptedProvider::new(), Some("k")).await;
        let pdf = build_test_pdf(&[&["Operator: Welcome"], &["CFO: Margins improved"]]);

        let doc = fx
            .lifecycle
            .ingest(Upload {
                filename: "q4.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                bytes: pdf,
            })
            .await
            .unwrap();

        assert_eq!(doc.file_type, "application/pdf");
        assert_eq!(
            doc.text_content.as_deref(),
            Some("Operator: Welcome CFO: Margins improved")
        );
    }

    #[tokio::test]
    async fn test_ingest_empty_text_persists_nothing() {
        let fx = setup(ScriptedProvider::new(), Some("k")).await;

        let err = fx
            .lifecycle
            .ingest(text_upload("blank.txt", " \n\t "))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::EmptyExtraction));

        let err = fx
            .lifecycle
            .ingest(Upload {
                filename: "chart.png".to_string(),
                mime_type: "image/png".to_string(),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Extraction(ExtractionError::UnsupportedFormat(_))
        ));

        assert_eq!(fx.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_analysis_success_completes_document() {
        let provider = ScriptedProvider::new()
            .reply("m1", "garbage")
            .reply("m2", VALID_ANALYSIS);
        let fx = setup(provider, Some("k")).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "CEO: Bookings hit a record."))
            .await
            .unwrap();

        let result = fx.lifecycle.request_analysis(&doc.id).await.unwrap();
        assert_eq!(result.management_tone.sentiment, Sentiment::Optimistic);

        let stored = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert_eq!(stored.analysis_result, Some(result.clone()));

        // A second request returns the stored analysis without new calls
        let again = fx.lifecycle.request_analysis(&doc.id).await.unwrap();
        assert_eq!(again, result);
        assert_eq!(fx.provider.called_models(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_all_models_failing_still_completes() {
        let fx = setup(ScriptedProvider::new(), Some("k")).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "Transcript"))
            .await
            .unwrap();

        let result = fx.lifecycle.request_analysis(&doc.id).await.unwrap();
        assert!(result.is_unavailable());

        let stored = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_client_error_marks_failed_and_allows_retry() {
        let fx = setup(ScriptedProvider::new().reply("m1", VALID_ANALYSIS), None).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "Transcript"))
            .await
            .unwrap();

        let err = fx.lifecycle.request_analysis(&doc.id).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Analysis(LlmError::Configuration(_))
        ));

        let stored = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert!(stored.analysis_result.is_none());

        // A failed document may be claimed again
        assert!(fx.repo.claim_for_analysis(&doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_in_progress_document_is_rejected() {
        let fx = setup(ScriptedProvider::new().reply("m1", VALID_ANALYSIS), Some("k")).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "Transcript"))
            .await
            .unwrap();
        fx.repo.claim_for_analysis(&doc.id).await.unwrap();

        let err = fx.lifecycle.request_analysis(&doc.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::AnalysisInProgress(_)));
        assert!(fx.provider.called_models().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_claim_is_analyzed_after_restart() {
        let fx = setup(ScriptedProvider::new(), Some("k")).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "Transcript"))
            .await
            .unwrap();

        // The process died after claiming, two hours ago
        assert!(fx.repo.claim_for_analysis(&doc.id).await.unwrap());
        let claimed_at = (Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        set_columns(&fx.db_path, &doc.id, Some(&claimed_at), None).await;

        let provider = Arc::new(ScriptedProvider::new().reply("m1", VALID_ANALYSIS));
        let restarted = open_lifecycle(&fx.db_path, provider.clone(), Some("k")).await;

        let result = restarted.request_analysis(&doc.id).await.unwrap();
        assert_eq!(result.management_tone.sentiment, Sentiment::Optimistic);
        assert_eq!(provider.called_models(), vec!["m1"]);

        let stored = restarted.get(&doc.id).await.unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert_eq!(stored.analysis_result, Some(result));
    }

    #[tokio::test]
    async fn test_unreadable_stored_analysis_is_redone() {
        let fx = setup(ScriptedProvider::new().reply("m1", VALID_ANALYSIS), Some("k")).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "Transcript"))
            .await
            .unwrap();

        fx.repo.claim_for_analysis(&doc.id).await.unwrap();
        fx.repo
            .complete(&doc.id, &AnalysisResult::unavailable())
            .await
            .unwrap();
        set_columns(&fx.db_path, &doc.id, None, Some("{\"management_tone\": 7")).await;

        let stored = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert!(stored.analysis_result.is_none());

        let result = fx.lifecycle.request_analysis(&doc.id).await.unwrap();
        assert_eq!(result.management_tone.sentiment, Sentiment::Optimistic);
        assert_eq!(fx.provider.called_models(), vec!["m1"]);

        let stored = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert_eq!(stored.analysis_result, Some(result));
    }

    #[tokio::test]
    async fn test_document_is_processing_while_models_run() {
        let provider = ScriptedProvider::new()
            .reply("m1", VALID_ANALYSIS)
            .delay("m1", std::time::Duration::from_millis(300));
        let fx = setup(provider, Some("k")).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "Transcript"))
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);

        let lifecycle = fx.lifecycle.clone();
        let id = doc.id.clone();
        let handle = tokio::spawn(async move { lifecycle.request_analysis(&id).await });

        // The provider is only called once the claim is stored
        for _ in 0..200 {
            if !fx.provider.called_models().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(fx.provider.called_models(), vec!["m1"]);
        let during = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(during.status, DocumentStatus::Processing);
        assert!(during.analysis_result.is_none());

        handle.await.unwrap().unwrap();
        let after = fx.lifecycle.get(&doc.id).await.unwrap();
        assert_eq!(after.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_requests_analyze_once() {
        let provider = ScriptedProvider::new()
            .reply("m1", VALID_ANALYSIS)
            .delay("m1", std::time::Duration::from_millis(200));
        let fx = setup(provider, Some("k")).await;
        let doc = fx
            .lifecycle
            .ingest(text_upload("call.txt", "Transcript"))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            fx.lifecycle.request_analysis(&doc.id),
            fx.lifecycle.request_analysis(&doc.id)
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(LifecycleError::AnalysisInProgress(_)))));
        assert_eq!(fx.provider.called_models(), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_missing_document() {
        let fx = setup(ScriptedProvider::new(), Some("k")).await;
        assert!(matches!(
            fx.lifecycle.request_analysis("nope").await,
            Err(LifecycleError::NotFound(_))
        ));
        assert!(matches!(
            fx.lifecycle.get("nope").await,
            Err(LifecycleError::NotFound(_))
        ));
    }
}
