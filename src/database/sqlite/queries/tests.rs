use super::*;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::raw_sql(include_str!("../migrations/001_documents.sql"))
        .execute(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

fn new_document(fingerprint: &str, file_name: &str, point_count: i64) -> NewDocument {
    NewDocument {
        fingerprint: fingerprint.to_string(),
        file_name: file_name.to_string(),
        file_path: format!("/uploads/{}", file_name),
        extension: ".txt".to_string(),
        point_count,
    }
}

#[tokio::test]
async fn document_crud_operations() {
    let (_temp_dir, pool) = create_test_pool().await;

    let created = DocumentQueries::upsert(&pool, &new_document("aaa111", "notes.txt", 4))
        .await
        .expect("Failed to record document");
    assert_eq!(created.fingerprint, "aaa111");
    assert_eq!(created.point_count, 4);
    assert_eq!(created.created_date, created.updated_date);

    let by_fingerprint = DocumentQueries::get_by_fingerprint(&pool, "aaa111")
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(by_fingerprint, created);

    let by_name = DocumentQueries::get_by_file_name(&pool, "notes.txt")
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(by_name.id, created.id);

    assert!(
        DocumentQueries::delete_by_fingerprint(&pool, "aaa111")
            .await
            .expect("Failed to delete document")
    );
    assert!(
        !DocumentQueries::delete_by_fingerprint(&pool, "aaa111")
            .await
            .expect("Failed to delete document")
    );
    assert!(
        DocumentQueries::get_by_fingerprint(&pool, "aaa111")
            .await
            .expect("Failed to get document")
            .is_none()
    );
}

#[tokio::test]
async fn upsert_updates_existing_fingerprint() {
    let (_temp_dir, pool) = create_test_pool().await;

    let first = DocumentQueries::upsert(&pool, &new_document("bbb222", "draft.txt", 3))
        .await
        .expect("Failed to record document");
    let second = DocumentQueries::upsert(&pool, &new_document("bbb222", "final.txt", 5))
        .await
        .expect("Failed to record document");

    assert_eq!(first.id, second.id);
    assert_eq!(second.file_name, "final.txt");
    assert_eq!(second.point_count, 5);
    assert_eq!(second.created_date, first.created_date);

    let all = DocumentQueries::list_all(&pool)
        .await
        .expect("Failed to list documents");
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn list_documents() {
    let (_temp_dir, pool) = create_test_pool().await;

    assert!(
        DocumentQueries::list_all(&pool)
            .await
            .expect("Failed to list documents")
            .is_empty()
    );

    for (fingerprint, name) in [("c1", "a.txt"), ("c2", "b.txt"), ("c3", "c.txt")] {
        DocumentQueries::upsert(&pool, &new_document(fingerprint, name, 1))
            .await
            .expect("Failed to record document");
    }

    let all = DocumentQueries::list_all(&pool)
        .await
        .expect("Failed to list documents");
    assert_eq!(all.len(), 3);
    let mut fingerprints: Vec<&str> = all.iter().map(|d| d.fingerprint.as_str()).collect();
    fingerprints.sort_unstable();
    assert_eq!(fingerprints, vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn missing_file_name_is_none() {
    let (_temp_dir, pool) = create_test_pool().await;
    assert!(
        DocumentQueries::get_by_file_name(&pool, "absent.pdf")
            .await
            .expect("Failed to query")
            .is_none()
    );
}
