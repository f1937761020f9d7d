
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An uploaded file known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    /// MD5 of the file bytes, also the vector collection name
    pub fingerprint: String,
    pub file_name: String,
    pub file_path: String,
    pub extension: String,
    pub point_count: i64,
    pub created_date: NaiveDateTime,
    pub updated_date: NaiveDateTime,
}

impl Document {
    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.fingerprint
    }

    /// First eight characters of the fingerprint, for display
    #[inline]
    pub fn short_fingerprint(&self) -> &str {
        self.fingerprint.get(..8).unwrap_or(&self.fingerprint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub fingerprint: String,
    pub file_name: String,
    pub file_path: String,
    pub extension: String,
    pub point_count: i64,
}
