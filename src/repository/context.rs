//! Database context for managing connections and repository access.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::document::DocumentRepository;
use super::pool::{AsyncSqlitePool, DieselError};

/// Database context that owns the connection factory and hands out repositories.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::from_path(&db_path);
/// ctx.init_schema().await?;
/// let doc = ctx.documents().get("some-id").await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    /// Create a context for a SQLite file.
    pub fn from_path(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL (`sqlite:path` or a bare path).
    pub fn from_url(database_url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(database_url),
        }
    }

    /// Get a document repository.
    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    /// Create tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                original_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL CHECK (file_size > 0),
                upload_date TEXT NOT NULL,
                text_content TEXT,
                analysis_result TEXT,
                status TEXT NOT NULL DEFAULT 'uploaded',
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
            CREATE INDEX IF NOT EXISTS idx_documents_upload_date ON documents(upload_date);
            "#,
        )
        .await
    }
}
