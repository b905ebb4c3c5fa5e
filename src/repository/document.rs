//! Diesel-based document repository for SQLite.
//!
//! Status changes that start or finish an analysis are conditional updates,
//! so a document is only ever claimed by one request at a time.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use super::models::{DocumentRecord, NewDocument};
use super::parse_datetime;
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::to_diesel_error;
use crate::models::{AnalysisResult, Document, DocumentStatus};
use crate::schema::documents;

/// Convert a database record to a domain model.
impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        let analysis_result = record.analysis_result.and_then(|json| {
            serde_json::from_str(&json)
                .map_err(|e| warn!("Unreadable analysis for document {}: {}", record.id, e))
                .ok()
        });

        Document {
            status: DocumentStatus::from_str(&record.status).unwrap_or(DocumentStatus::Failed),
            filename: record.filename,
            original_name: record.original_name,
            file_type: record.file_type,
            file_size: record.file_size.max(0) as u64,
            upload_date: parse_datetime(&record.upload_date),
            text_content: record.text_content,
            analysis_result,
            id: record.id,
        }
    }
}

/// Diesel-based document repository.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: AsyncSqlitePool,
}

impl DocumentRepository {
    /// Create a new document repository with an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new document.
    pub async fn insert(&self, doc: &Document) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let analysis_json = doc
            .analysis_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(to_diesel_error)?;
        let upload_date = doc.upload_date.to_rfc3339();
        let now = Utc::now().to_rfc3339();

        diesel::insert_into(documents::table)
            .values(NewDocument {
                id: &doc.id,
                filename: &doc.filename,
                original_name: &doc.original_name,
                file_type: &doc.file_type,
                file_size: doc.file_size as i64,
                upload_date: &upload_date,
                text_content: doc.text_content.as_deref(),
                analysis_result: analysis_json.as_deref(),
                status: doc.status.as_str(),
                updated_at: &now,
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Get a document by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Document>, DieselError> {
        let mut conn = self.pool.get().await?;

        documents::table
            .find(id)
            .first::<DocumentRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Document::from))
    }

    /// Most recently uploaded documents first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Document>, DieselError> {
        let mut conn = self.pool.get().await?;

        documents::table
            .order(documents::upload_date.desc())
            .limit(limit)
            .load::<DocumentRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Document::from).collect())
    }

    /// Count all documents.
    pub async fn count(&self) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        documents::table
            .select(count_star())
            .first(&mut conn)
            .await
    }

    /// Move a document into `processing` if it is `uploaded` or `failed`.
    ///
    /// Any previous analysis is cleared. Returns false when the document is
    /// missing or in another state, including when a concurrent request
    /// claimed it first.
    pub async fn claim_for_analysis(&self, id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let claimable: Vec<&str> = DocumentStatus::claimable()
            .iter()
            .map(|s| s.as_str())
            .collect();
        let now = Utc::now().to_rfc3339();

        let rows = diesel::update(
            documents::table
                .filter(documents::id.eq(id))
                .filter(documents::status.eq_any(claimable)),
        )
        .set((
            documents::status.eq(DocumentStatus::Processing.as_str()),
            documents::analysis_result.eq(None::<String>),
            documents::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows == 1)
    }

    /// Take over a `processing` document whose claim was last touched before
    /// `stale_before`, as left behind when a process dies mid-analysis.
    pub async fn reclaim_stale(
        &self,
        id: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let cutoff = stale_before.to_rfc3339();
        let now = Utc::now().to_rfc3339();

        let rows = diesel::update(
            documents::table
                .filter(documents::id.eq(id))
                .filter(documents::status.eq(DocumentStatus::Processing.as_str()))
                .filter(documents::updated_at.lt(&cutoff)),
        )
        .set((
            documents::analysis_result.eq(None::<String>),
            documents::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows == 1)
    }

    /// Store the analysis and mark a `processing` document `completed`.
    pub async fn complete(&self, id: &str, result: &AnalysisResult) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(result).map_err(to_diesel_error)?;
        let now = Utc::now().to_rfc3339();

        let rows = diesel::update(
            documents::table
                .filter(documents::id.eq(id))
                .filter(documents::status.eq(DocumentStatus::Processing.as_str())),
        )
        .set((
            documents::status.eq(DocumentStatus::Completed.as_str()),
            documents::analysis_result.eq(Some(json)),
            documents::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows == 1)
    }

    /// Mark a document `failed` and clear any analysis.
    pub async fn mark_failed(&self, id: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::update(documents::table.find(id))
            .set((
                documents::status.eq(DocumentStatus::Failed.as_str()),
                documents::analysis_result.eq(None::<String>),
                documents::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DbContext;
    use tempfile::tempdir;

    async fn setup_test_db() -> (DocumentRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::from_path(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        (ctx.documents(), dir)
    }

    fn sample() -> Document {
        Document::new(
            "Q2 2024 call.txt",
            "text/plain",
            42,
            "Revenue rose.".to_string(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let (repo, _dir) = setup_test_db().await;
        let doc = sample();

        repo.insert(&doc).await.unwrap();
        let fetched = repo.get(&doc.id).await.unwrap().unwrap();

        assert_eq!(fetched.id, doc.id);
        assert_eq!(fetched.filename, doc.filename);
        assert_eq!(fetched.original_name, doc.original_name);
        assert_eq!(fetched.file_type, doc.file_type);
        assert_eq!(fetched.file_size, 42);
        assert_eq!(fetched.upload_date, doc.upload_date);
        assert_eq!(fetched.text_content, doc.text_content);
        assert_eq!(fetched.status, DocumentStatus::Uploaded);
        assert!(fetched.analysis_result.is_none());

        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let (repo, _dir) = setup_test_db().await;
        let doc = sample();
        repo.insert(&doc).await.unwrap();

        assert!(repo.claim_for_analysis(&doc.id).await.unwrap());
        assert!(!repo.claim_for_analysis(&doc.id).await.unwrap());
        assert!(!repo.claim_for_analysis("missing").await.unwrap());

        let fetched = repo.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Processing);
    }

    #[tokio::test]
    async fn test_complete_stores_result() {
        let (repo, _dir) = setup_test_db().await;
        let doc = sample();
        repo.insert(&doc).await.unwrap();

        // Not processing yet
        assert!(!repo
            .complete(&doc.id, &AnalysisResult::unavailable())
            .await
            .unwrap());

        repo.claim_for_analysis(&doc.id).await.unwrap();
        assert!(repo
            .complete(&doc.id, &AnalysisResult::unavailable())
            .await
            .unwrap());

        let fetched = repo.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Completed);
        assert_eq!(fetched.analysis_result, Some(AnalysisResult::unavailable()));

        // Completed documents cannot be claimed again
        assert!(!repo.claim_for_analysis(&doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_document_can_be_reclaimed() {
        let (repo, _dir) = setup_test_db().await;
        let doc = sample();
        repo.insert(&doc).await.unwrap();

        repo.claim_for_analysis(&doc.id).await.unwrap();
        repo.mark_failed(&doc.id).await.unwrap();

        let fetched = repo.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Failed);
        assert!(fetched.analysis_result.is_none());

        assert!(repo.claim_for_analysis(&doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reclaim_only_stale_claims() {
        let (repo, _dir) = setup_test_db().await;
        let doc = sample();
        repo.insert(&doc).await.unwrap();

        // Not processing
        assert!(!repo.reclaim_stale(&doc.id, Utc::now()).await.unwrap());

        repo.claim_for_analysis(&doc.id).await.unwrap();
        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        assert!(!repo.reclaim_stale(&doc.id, an_hour_ago).await.unwrap());

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert!(repo.reclaim_stale(&doc.id, later).await.unwrap());

        // The refreshed claim is no longer stale
        assert!(!repo.reclaim_stale(&doc.id, an_hour_ago).await.unwrap());
        let fetched = repo.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Processing);
    }

    #[tokio::test]
    async fn test_recent_orders_newest_first() {
        let (repo, _dir) = setup_test_db().await;
        let mut older = sample();
        older.upload_date = older.upload_date - chrono::Duration::hours(1);
        let newer = sample();
        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, newer.id);
        assert_eq!(recent[1].id, older.id);
    }
}
