//! Connection setup for the state database
//!
//! The schema version is kept in SQLite's `user_version` header. Opening an
//! existing file applies only the migrations it has not seen yet, and a file
//! written by a newer schema is refused rather than modified.

use std::path::Path;
use std::time::Duration;

use photolift_core::config::StateConfig;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;

use crate::CacheError;

/// Schema version written by this build
pub const SCHEMA_VERSION: i64 = 1;

/// Ordered migrations, each tagged with the version it produces
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("migrations/20260301_initial.sql"))];

/// One writer replaces whole documents; a second connection lets a reader
/// proceed alongside it under WAL.
const MAX_CONNECTIONS: u32 = 2;

/// SQLite connections for the upload-state database
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database configured under `state.database`
    pub async fn open(config: &StateConfig) -> Result<Self, CacheError> {
        Self::new(&config.database).await
    }

    /// Opens (creating if needed) the database at `db_path`
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the file cannot be created or opened,
    /// `CacheError::MigrationFailed` if its schema cannot be brought up to
    /// [`SCHEMA_VERSION`].
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Cannot create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // NORMAL is durable across application crashes in WAL mode
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Cannot open state database {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        let applied = migrate(&pool).await?;
        tracing::info!(
            path = %db_path.display(),
            schema_version = SCHEMA_VERSION,
            applied,
            "State database opened"
        );

        Ok(Self { pool })
    }

    /// Private in-memory database, for tests
    ///
    /// Limited to one connection: every SQLite connection to `:memory:` sees
    /// its own database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Cannot open in-memory database: {}", e))
            })?;

        migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema version recorded in the open database
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        user_version(&self.pool).await
    }

    /// Waits for checked-out connections to return, then closes them all
    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn user_version(pool: &SqlitePool) -> Result<i64, CacheError> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    Ok(row.try_get::<i64, _>(0)?)
}

/// Applies every migration newer than the file's version, returning how many ran
async fn migrate(pool: &SqlitePool) -> Result<usize, CacheError> {
    let current = user_version(pool).await?;
    if current > SCHEMA_VERSION {
        return Err(CacheError::MigrationFailed(format!(
            "state database has schema version {}, newer than the supported {}",
            current, SCHEMA_VERSION
        )));
    }

    let mut applied = 0;
    for (version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
            CacheError::MigrationFailed(format!("Migration to version {} failed: {}", version, e))
        })?;
        // PRAGMA does not take bind parameters
        sqlx::raw_sql(&format!("PRAGMA user_version = {}", version))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(version, "Applied state database migration");
        applied += 1;
    }
    Ok(applied)
}
