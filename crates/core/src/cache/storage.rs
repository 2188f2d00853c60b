//! Namespace-level operations: open, enumerate, delete.
//!
//! A namespace is a named key-value store inside the shared database. Opening
//! one creates it if absent and hands back a [`Namespace`] handle scoped to
//! that name.

use super::connection::CacheDb;
use super::entries::Namespace;
use crate::Error;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use tokio_rusqlite::params;

/// Create the namespace row if absent and return its id.
pub(crate) fn ensure_namespace(conn: &rusqlite::Connection, name: &str) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_storage (cache_name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    conn.query_row("SELECT id FROM cache_storage WHERE cache_name = ?1", params![name], |row| {
        row.get(0)
    })
}

impl CacheDb {
    /// Open (create-if-absent) the namespace called `name`.
    pub async fn open_namespace(&self, name: &str) -> Result<Namespace, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<i64, Error> { Ok(ensure_namespace(conn, &owned)?) })
            .await
            .map_err(Error::from)?;

        Ok(Namespace::new(self.clone(), name))
    }

    /// Check whether a namespace exists without creating it.
    pub async fn has_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let id: Option<i64> = conn
                    .query_row("SELECT id FROM cache_storage WHERE cache_name = ?1", params![name], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok(id.is_some())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every namespace, in creation order.
    pub async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT cache_name FROM cache_storage ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and all of its entries.
    ///
    /// Returns false if no namespace with that name existed.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_storage WHERE cache_name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
