use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::bucket::BucketBackend;
use crate::domain::ChunkId;
use crate::error::BucketError;

/// In-memory bucket, used by tests and `Backend::Memory`.
#[derive(Debug, Default)]
pub struct MemBucket {
    index: usize,
    chunks: DashMap<ChunkId, Bytes>,
    puts: AtomicU64,
    deletes: AtomicU64,
}

impl MemBucket {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, id: &ChunkId) -> bool {
        self.chunks.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|e| e.key().clone()).collect()
    }

    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Drops a chunk behind the catalog's back (simulates bucket data loss).
    pub fn evict(&self, id: &ChunkId) -> Option<Bytes> {
        self.chunks.remove(id).map(|(_, v)| v)
    }
}

#[async_trait]
impl BucketBackend for MemBucket {
    fn index(&self) -> usize {
        self.index
    }

    async fn put(&self, id: &ChunkId, data: Bytes) -> Result<(), BucketError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.chunks.insert(id.clone(), data);
        Ok(())
    }

    async fn get(&self, id: &ChunkId) -> Result<Bytes, BucketError> {
        self.chunks
            .get(id)
            .map(|v| v.value().clone())
            .ok_or_else(|| BucketError::NotFound {
                bucket: self.index,
                id: id.to_string(),
            })
    }

    async fn delete(&self, id: &ChunkId) -> Result<(), BucketError> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.chunks.remove(id);
        Ok(())
    }
}
