// split_core/src/bucket.rs
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::ChunkId;
use crate::error::BucketError;

/// Key/value blob store holding the chunks of one partition index.
#[async_trait]
pub trait BucketBackend: Send + Sync {
    /// Partition index this backend serves (0-based).
    fn index(&self) -> usize;

    async fn put(&self, id: &ChunkId, data: Bytes) -> Result<(), BucketError>;

    async fn get(&self, id: &ChunkId) -> Result<Bytes, BucketError>;

    /// Removes a chunk. Missing chunks are not an error.
    async fn delete(&self, id: &ChunkId) -> Result<(), BucketError>;
}

/// The N bucket backends of a deployment, addressed by partition index.
#[derive(Clone)]
pub struct Buckets {
    inner: Vec<Arc<dyn BucketBackend>>,
}

impl Buckets {
    pub fn new(inner: Vec<Arc<dyn BucketBackend>>) -> Self {
        Self { inner }
    }

    pub fn fan_out(&self) -> usize {
        self.inner.len()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn BucketBackend>> {
        self.inner.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn BucketBackend>> {
        self.inner.iter()
    }
}

impl std::fmt::Debug for Buckets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buckets")
            .field("fan_out", &self.inner.len())
            .finish()
    }
}
