//! Sequential schema migrations tracked in a `migrations` version table.

use std::path::Path;

use libsql::{Connection, params};
use tracing::info;

use crate::error::{Result, SplitError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub sql: String,
}

const EMBEDDED: &[(&str, &str)] = &[
    (
        "0001_create_files.sql",
        include_str!("../../migrations/0001_create_files.sql"),
    ),
    (
        "0002_unique_chunk_ids.sql",
        include_str!("../../migrations/0002_unique_chunk_ids.sql"),
    ),
];

#[derive(Clone, Debug, Default)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    /// The schema this crate ships with.
    pub fn embedded() -> Self {
        let migrations = EMBEDDED
            .iter()
            .map(|(file, sql)| Migration {
                // embedded names are fixed above
                version: version_from_filename(file).unwrap_or_default(),
                name: (*file).to_string(),
                sql: (*sql).to_string(),
            })
            .collect();
        Self { migrations }
    }

    /// Loads every `NNNN_name.sql` in `dir`; the numeric prefix is the version.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut migrations = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    SplitError::Migration(format!("non-utf8 file name: {}", path.display()))
                })?
                .to_string();
            let version = version_from_filename(&name)?;
            let sql = std::fs::read_to_string(&path)?;
            migrations.push(Migration { version, name, sql });
        }
        Self::from_migrations(migrations)
    }

    pub fn from_migrations(mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by_key(|m| m.version);
        if let Some(w) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(SplitError::Migration(format!(
                "duplicate version {} ({} and {})",
                w[0].version, w[0].name, w[1].name
            )));
        }
        Ok(Self { migrations })
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Applies pending migrations in ascending order; returns the versions applied.
    pub async fn run(&self, conn: &Connection) -> Result<Vec<i64>> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS migrations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                version    INTEGER NOT NULL UNIQUE,
                applied_at INTEGER NOT NULL
            );",
        )
        .await
        .map_err(migration_err)?;

        let mut applied = Vec::new();
        for m in &self.migrations {
            if is_applied(conn, m.version).await? {
                info!(version = m.version, "migration already applied, skipping");
                continue;
            }
            apply(conn, m).await?;
            info!(version = m.version, name = %m.name, "migration applied");
            applied.push(m.version);
        }
        Ok(applied)
    }
}

fn version_from_filename(name: &str) -> Result<i64> {
    name.split('_')
        .next()
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| SplitError::Migration(format!("no numeric version prefix: {name}")))
}

async fn is_applied(conn: &Connection, version: i64) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM migrations WHERE version = ?1",
            params![version],
        )
        .await
        .map_err(migration_err)?;
    let count = match rows.next().await.map_err(migration_err)? {
        Some(row) => row.get::<i64>(0).map_err(migration_err)?,
        None => 0,
    };
    Ok(count > 0)
}

async fn apply(conn: &Connection, m: &Migration) -> Result<()> {
    let tx = conn.transaction().await.map_err(migration_err)?;
    let res = async {
        tx.execute_batch(&m.sql).await?;
        tx.execute(
            "INSERT INTO migrations (version, applied_at) VALUES (?1, ?2)",
            params![m.version, super::now_unix()],
        )
        .await?;
        Ok::<_, libsql::Error>(())
    }
    .await;
    match res {
        Ok(()) => tx.commit().await.map_err(migration_err),
        Err(e) => {
            let _ = tx.rollback().await;
            Err(SplitError::Migration(format!("{}: {e}", m.name)))
        }
    }
}

fn migration_err(e: libsql::Error) -> SplitError {
    SplitError::Migration(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_set_is_ordered() {
        let m = Migrator::embedded();
        let versions: Vec<i64> = m.migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn version_prefix_is_required() {
        assert_eq!(version_from_filename("0003_add_index.sql").unwrap(), 3);
        assert!(version_from_filename("add_index.sql").is_err());
    }

    #[test]
    fn duplicate_versions_are_rejected() {
        let mk = |v, n: &str| Migration {
            version: v,
            name: n.to_string(),
            sql: String::new(),
        };
        let err = Migrator::from_migrations(vec![mk(1, "a"), mk(1, "b")]).unwrap_err();
        assert!(matches!(err, SplitError::Migration(_)));
    }

    #[test]
    fn from_dir_sorts_and_skips_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("0002_b.sql"), "SELECT 2;").unwrap();
        std::fs::write(tmp.path().join("0001_a.sql"), "SELECT 1;").unwrap();
        std::fs::write(tmp.path().join("README.md"), "notes").unwrap();
        let m = Migrator::from_dir(tmp.path()).unwrap();
        let names: Vec<&str> = m.migrations().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["0001_a.sql", "0002_b.sql"]);
    }
}
