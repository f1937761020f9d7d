#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const DOCUMENT_COLUMNS: &str = "id, fingerprint, file_name, file_path, extension, point_count, created_date, updated_date";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a document, or refresh the existing row with the same fingerprint
    #[inline]
    pub async fn upsert(pool: &SqlitePool, new_document: &NewDocument) -> Result<Document> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO documents (fingerprint, file_name, file_path, extension, point_count, created_date, updated_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fingerprint) DO UPDATE SET
                file_name = excluded.file_name,
                file_path = excluded.file_path,
                extension = excluded.extension,
                point_count = excluded.point_count,
                updated_date = excluded.updated_date
            "#,
        )
        .bind(&new_document.fingerprint)
        .bind(&new_document.file_name)
        .bind(&new_document.file_path)
        .bind(&new_document.extension)
        .bind(new_document.point_count)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to record document")?;

        debug!("Recorded document {}", new_document.fingerprint);

        Self::get_by_fingerprint(pool, &new_document.fingerprint)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve recorded document"))
    }

    #[inline]
    pub async fn get_by_fingerprint(
        pool: &SqlitePool,
        fingerprint: &str,
    ) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE fingerprint = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(fingerprint)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by fingerprint")
    }

    /// Most recently updated document with this file name
    #[inline]
    pub async fn get_by_file_name(pool: &SqlitePool, file_name: &str) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE file_name = ? ORDER BY updated_date DESC, id DESC LIMIT 1",
            DOCUMENT_COLUMNS
        ))
        .bind(file_name)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by file name")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents ORDER BY updated_date DESC, id DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list documents")
    }

    /// Returns true when a row was removed
    #[inline]
    pub async fn delete_by_fingerprint(pool: &SqlitePool, fingerprint: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE fingerprint = ?")
            .bind(fingerprint)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }
}
