use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{Document, NewDocument};
use crate::database::sqlite::queries::DocumentQueries;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

pub const DATABASE_FILE_NAME: &str = "documents.db";

/// Registry of uploaded documents
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join(DATABASE_FILE_NAME);

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(&db_path).await
    }

    // Document operations
    pub async fn record_upload(&self, document: &NewDocument) -> Result<Document> {
        DocumentQueries::upsert(&self.pool, document).await
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        DocumentQueries::list_all(&self.pool).await
    }

    /// Look a document up by fingerprint, falling back to file name
    pub async fn find_document(&self, identifier: &str) -> Result<Option<Document>> {
        if let Some(document) = DocumentQueries::get_by_fingerprint(&self.pool, identifier).await? {
            return Ok(Some(document));
        }
        DocumentQueries::get_by_file_name(&self.pool, identifier).await
    }

    pub async fn delete_document(&self, fingerprint: &str) -> Result<bool> {
        DocumentQueries::delete_by_fingerprint(&self.pool, fingerprint).await
    }
}
