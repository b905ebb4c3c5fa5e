//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Document record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub upload_date: String,
    pub text_content: Option<String>,
    pub analysis_result: Option<String>,
    pub status: String,
    pub updated_at: String,
}

/// New document for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::documents)]
pub struct NewDocument<'a> {
    pub id: &'a str,
    pub filename: &'a str,
    pub original_name: &'a str,
    pub file_type: &'a str,
    pub file_size: i64,
    pub upload_date: &'a str,
    pub text_content: Option<&'a str>,
    pub analysis_result: Option<&'a str>,
    pub status: &'a str,
    pub updated_at: &'a str,
}
