use thiserror::Error;

use crate::domain::FileId;

/// Failure of a single bucket backend operation.
#[derive(Error, Debug)]
pub enum BucketError {
    #[error("chunk {id} not found in bucket {bucket}")]
    NotFound { bucket: usize, id: String },

    #[error("bucket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a catalog store.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("file {0} not found")]
    NotFound(FileId),

    #[error("catalog store error: {0}")]
    Store(String),
}

impl From<libsql::Error> for CatalogError {
    fn from(e: libsql::Error) -> Self {
        CatalogError::Store(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("fan-out must be at least 1, got {0}")]
    InvalidFanOut(usize),

    #[error("write of chunk {id} to bucket {bucket} failed: {source}")]
    ChunkWrite {
        bucket: usize,
        id: String,
        #[source]
        source: BucketError,
    },

    #[error("catalog write failed: {0}")]
    CatalogWrite(String),

    #[error("file {0} not found")]
    NotFound(FileId),

    #[error("catalog read failed: {0}")]
    CatalogRead(String),

    #[error("read of chunk {id} from bucket {bucket} failed: {source}")]
    ChunkRead {
        bucket: usize,
        id: String,
        #[source]
        source: BucketError,
    },

    #[error("reassembled {actual} bytes, catalog recorded {expected}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("migration error: {0}")]
    Migration(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SplitError {
    /// Maps a catalog lookup failure, keeping `NotFound` distinct from store errors.
    pub fn from_catalog_read(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(id) => SplitError::NotFound(id),
            CatalogError::Store(msg) => SplitError::CatalogRead(msg),
        }
    }

    pub fn from_catalog_write(e: CatalogError) -> Self {
        SplitError::CatalogWrite(e.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SplitError::NotFound(_))
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, SplitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_not_found_stays_not_found() {
        let e = SplitError::from_catalog_read(CatalogError::NotFound(FileId(7)));
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "file 7 not found");
    }

    #[test]
    fn catalog_store_error_is_read_error() {
        let e = SplitError::from_catalog_read(CatalogError::Store("connection lost".into()));
        assert!(matches!(e, SplitError::CatalogRead(ref m) if m.contains("connection lost")));
    }

    #[test]
    fn chunk_write_error_names_bucket_and_id() {
        let e = SplitError::ChunkWrite {
            bucket: 2,
            id: "abc".into(),
            source: BucketError::Io(std::io::Error::other("disk full")),
        };
        let msg = e.to_string();
        assert!(msg.contains("bucket 2"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("disk full"));
    }
}
