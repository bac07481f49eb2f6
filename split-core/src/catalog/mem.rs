use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Catalog, check_fan_out, now_unix};
use crate::domain::{FileId, FileRecord, NewFile};
use crate::error::CatalogError;

/// Process-local catalog. Ids start at 1 like an AUTOINCREMENT column.
#[derive(Debug)]
pub struct MemCatalog {
    fan_out: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    by_id: BTreeMap<FileId, FileRecord>,
}

impl MemCatalog {
    pub fn new(fan_out: usize) -> Self {
        Self {
            fan_out,
            inner: Mutex::new(Inner {
                next_id: 1,
                by_id: BTreeMap::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, CatalogError> {
        self.inner
            .lock()
            .map_err(|e| CatalogError::Store(e.to_string()))
    }
}

#[async_trait]
impl Catalog for MemCatalog {
    async fn create(&self, file: NewFile) -> Result<FileId, CatalogError> {
        check_fan_out(&file, self.fan_out)?;
        let mut g = self.lock()?;
        let id = FileId(g.next_id);
        g.next_id += 1;
        g.by_id.insert(
            id,
            FileRecord {
                id,
                name: file.name,
                size: file.size,
                created_at: now_unix(),
                chunk_ids: file.chunk_ids,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: FileId) -> Result<FileRecord, CatalogError> {
        self.lock()?
            .by_id
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<FileRecord>, CatalogError> {
        Ok(self.lock()?.by_id.values().cloned().collect())
    }
}
