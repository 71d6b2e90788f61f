//! Local SQLite storage for the database sink.
//!
//! Handles connection pool creation and schema migrations. The schema is
//! three catalog tables (users, projects, pipelines) tracked by a
//! `_migrations` table so reruns are no-ops.

pub mod pool;

use std::path::Path;

use crate::error::BackupError;

/// Initialize the database: create the file if needed and run migrations.
///
/// The parent directory is created first; SQLite only creates the file
/// itself.
pub async fn initialize(db_path: &Path) -> Result<pool::DbPool, BackupError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            BackupError::persistence_for(
                format!("failed to create database directory: {}", e),
                parent.display().to_string(),
            )
        })?;
    }

    let pool = pool::create_pool(db_path).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run all pending migrations.
async fn run_migrations(pool: &pool::DbPool) -> Result<(), BackupError> {
    let mut conn = pool.acquire().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    let applied: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM _migrations WHERE name = '0001_initial_schema'")
            .fetch_optional(&mut *conn)
            .await?;

    if applied.is_none() {
        let migration_sql = include_str!("migrations/0001_initial_schema.sql");
        sqlx::raw_sql(migration_sql).execute(&mut *conn).await?;

        sqlx::query("INSERT INTO _migrations (name) VALUES ('0001_initial_schema')")
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
