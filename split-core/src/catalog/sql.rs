use std::collections::BTreeMap;

use async_trait::async_trait;
use libsql::{Builder, Connection, Database, params};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::migrate::Migrator;
use super::{Catalog, check_fan_out, now_unix};
use crate::domain::{ChunkId, FileId, FileRecord, NewFile};
use crate::error::{CatalogError, Result, SplitError};

/// libsql-backed catalog: one `files` row plus one `file_chunks` row per bucket.
///
/// Writes go through a single connection guarded by a mutex, so each `create`
/// runs as its own transaction without interleaving with another upload's.
pub struct SqlCatalog {
    _db: Database,
    conn: Mutex<Connection>,
    fan_out: usize,
}

impl SqlCatalog {
    /// Opens the database without touching the schema.
    pub async fn open(path: &str, fan_out: usize) -> std::result::Result<Self, CatalogError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").await?;
        info!(path, fan_out, "catalog opened");
        Ok(Self {
            _db: db,
            conn: Mutex::new(conn),
            fan_out,
        })
    }

    /// Opens the database and brings it up to the embedded schema.
    pub async fn open_migrated(path: &str, fan_out: usize) -> Result<Self> {
        let cat = Self::open(path, fan_out)
            .await
            .map_err(|e| SplitError::CatalogRead(e.to_string()))?;
        cat.migrate(&Migrator::embedded()).await?;
        Ok(cat)
    }

    pub async fn migrate(&self, migrator: &Migrator) -> Result<Vec<i64>> {
        let conn = self.conn.lock().await;
        migrator.run(&conn).await
    }
}

async fn insert_file(
    conn: &Connection,
    file: &NewFile,
    created_at: i64,
) -> std::result::Result<i64, CatalogError> {
    let mut rows = conn
        .query(
            "INSERT INTO files (original_filename, size, created_at) VALUES (?1, ?2, ?3) RETURNING id",
            params![file.name.as_str(), file.size as i64, created_at],
        )
        .await?;
    let id = match rows.next().await? {
        Some(row) => row.get::<i64>(0)?,
        None => return Err(CatalogError::Store("insert returned no id".into())),
    };
    drop(rows);

    for (bucket, chunk) in file.chunk_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO file_chunks (file_id, bucket_index, chunk_id) VALUES (?1, ?2, ?3)",
            params![id, bucket as i64, chunk.as_str()],
        )
        .await?;
    }
    Ok(id)
}

async fn chunk_ids_for(
    conn: &Connection,
    id: i64,
) -> std::result::Result<Vec<ChunkId>, CatalogError> {
    let mut rows = conn
        .query(
            "SELECT chunk_id FROM file_chunks WHERE file_id = ?1 ORDER BY bucket_index",
            params![id],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(ChunkId::from(row.get::<String>(0)?));
    }
    Ok(out)
}

fn record_from_row(row: &libsql::Row) -> std::result::Result<FileRecord, CatalogError> {
    Ok(FileRecord {
        id: FileId(row.get::<i64>(0)?),
        name: row.get::<String>(1)?,
        size: row.get::<i64>(2)? as u64,
        created_at: row.get::<i64>(3)?,
        chunk_ids: Vec::new(),
    })
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn create(&self, file: NewFile) -> std::result::Result<FileId, CatalogError> {
        check_fan_out(&file, self.fan_out)?;
        let conn = self.conn.lock().await;
        let tx = conn.transaction().await?;
        match insert_file(&tx, &file, now_unix()).await {
            Ok(id) => {
                tx.commit().await?;
                debug!(file_id = id, name = %file.name, "catalog row created");
                Ok(FileId(id))
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn get(&self, id: FileId) -> std::result::Result<FileRecord, CatalogError> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT id, original_filename, size, created_at FROM files WHERE id = ?1",
                params![id.0],
            )
            .await?;
        let mut rec = match rows.next().await? {
            Some(row) => record_from_row(&row)?,
            None => return Err(CatalogError::NotFound(id)),
        };
        drop(rows);
        rec.chunk_ids = chunk_ids_for(&conn, id.0).await?;
        Ok(rec)
    }

    async fn list(&self) -> std::result::Result<Vec<FileRecord>, CatalogError> {
        let conn = self.conn.lock().await;
        let mut by_id: BTreeMap<i64, FileRecord> = BTreeMap::new();

        let mut rows = conn
            .query(
                "SELECT id, original_filename, size, created_at FROM files ORDER BY id",
                (),
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let rec = record_from_row(&row)?;
            by_id.insert(rec.id.0, rec);
        }
        drop(rows);

        let mut rows = conn
            .query(
                "SELECT file_id, chunk_id FROM file_chunks ORDER BY file_id, bucket_index",
                (),
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let file_id = row.get::<i64>(0)?;
            if let Some(rec) = by_id.get_mut(&file_id) {
                rec.chunk_ids.push(ChunkId::from(row.get::<String>(1)?));
            }
        }
        Ok(by_id.into_values().collect())
    }
}
