use async_trait::async_trait;

use crate::domain::{FileId, FileRecord, NewFile};
use crate::error::CatalogError;

pub mod mem;
pub mod migrate;
pub mod sql;

pub use mem::MemCatalog;
pub use migrate::{Migration, Migrator};
pub use sql::SqlCatalog;

/// Durable mapping from file id to name and per-bucket chunk ids.
///
/// `create` is all-or-nothing: either the record with all of its chunk ids becomes
/// visible, or nothing does. Records are never updated afterwards.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn create(&self, file: NewFile) -> Result<FileId, CatalogError>;

    async fn get(&self, id: FileId) -> Result<FileRecord, CatalogError>;

    /// All records, ascending by id.
    async fn list(&self) -> Result<Vec<FileRecord>, CatalogError>;
}

pub(crate) fn check_fan_out(file: &NewFile, fan_out: usize) -> Result<(), CatalogError> {
    if file.chunk_ids.len() != fan_out {
        return Err(CatalogError::Store(format!(
            "record for {:?} has {} chunk ids, fan-out is {}",
            file.name,
            file.chunk_ids.len(),
            fan_out
        )));
    }
    Ok(())
}

pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
