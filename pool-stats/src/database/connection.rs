//! Database connection management

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::time::Duration;
use std::path::Path;
use tracing::debug;
use crate::database::schema::{CREATE_INDEXES, CREATE_TABLES};
use crate::error::Result;

pub struct Database {
    pool: sqlx::SqlitePool,
}

impl Database {
    /// Open (or create) the SQLite file in WAL mode so reads proceed during an ingestion batch.
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Apply the schema. Every statement is `IF NOT EXISTS`, so this is safe on each start.
    pub async fn migrate(&self) -> Result<()> {
        for statement in CREATE_TABLES.iter().chain(CREATE_INDEXES) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(tables = CREATE_TABLES.len(), "Schema applied");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    /// Migrated database in a throwaway directory; keep the `TempDir` alive.
    pub async fn test_database() -> (Database, TempDir) {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        db.migrate().await.unwrap();
        (db, temp_dir)
    }

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.migrate().await.unwrap();

        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sp_deposit_events")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(result.0, 0);

        drop(db);
        temp_dir.close().unwrap();
    }

    #[tokio::test]
    async fn test_database_directory_creation() {
        let temp_dir = tempdir().unwrap();
        let nested_dir = temp_dir.path().join("nested").join("deep");
        let db_path = nested_dir.join("test.db");

        let db = Database::new(&db_path).await.unwrap();

        assert!(nested_dir.exists());
        assert!(db_path.exists());

        drop(db);
        temp_dir.close().unwrap();
    }

    #[tokio::test]
    async fn test_migration_is_repeatable() {
        let (db, _dir) = test_database().await;
        db.migrate().await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, CREATE_TABLES.len() as i64);
    }

    #[tokio::test]
    async fn test_migration_failure() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();

        // A pre-existing table with a different shape breaks index creation
        sqlx::query("CREATE TABLE sp_deposit_events (id INTEGER PRIMARY KEY)")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(db.migrate().await.is_err());
    }
}
