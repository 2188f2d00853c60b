//! Cache storage schema.
//!
//! Version 1 creates `cache_storage` (one row per namespace, ordered by
//! creation) and `cache_entries` (one row per stored request, removed with
//! its namespace through `ON DELETE CASCADE`). Applied versions are recorded
//! in `_migrations`, and each version runs in its own transaction.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Schema versions in application order.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_cache_storage.sql"))];

/// Bring the cache schema up to the latest version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the version whose SQL failed;
/// that version is rolled back and later versions are not attempted.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("cache schema v{version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied cache schema migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
