// Database module
// LanceDB holds the chunk vectors, SQLite keeps the registry of uploaded documents

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{CollectionStatus, Payload, ScoredPoint, VectorStore};
pub use self::sqlite::Database;
pub use self::sqlite::models::{Document, NewDocument};
