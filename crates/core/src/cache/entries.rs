//! Entry operations inside a namespace, plus lookups across all namespaces.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use super::connection::CacheDb;
use super::hash::request_key;
use super::storage::ensure_namespace;
use crate::Error;
use crate::http::{Request, Response, ResponseType};

/// Handle on a single namespace.
///
/// The handle is bound to the namespace name, not a row id: every write
/// re-opens the namespace, so a handle outliving a deletion recreates it
/// instead of failing.
#[derive(Clone, Debug)]
pub struct Namespace {
    db: CacheDb,
    name: String,
}

/// Listing entry for a stored request.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntrySummary {
    pub method: String,
    pub request_url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub body_len: usize,
    pub stored_at: String,
}

/// Column values of one entry, owned so they can move into the db thread.
struct EntryRow {
    request_key: String,
    method: String,
    request_url: String,
    response_url: String,
    status: u16,
    status_text: String,
    response_type: &'static str,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            request_key: request_key(request),
            method: request.method().to_string(),
            request_url: request.url().to_string(),
            response_url: response.url.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.response_type.as_str(),
            headers_json,
            body: response.body.to_vec(),
        })
    }
}

const SELECT_RESPONSE: &str = "SELECT e.response_url, e.status, e.status_text, e.response_type, e.headers_json, e.body
     FROM cache_entries e JOIN cache_storage s ON s.id = e.cache_id";

fn upsert_entry(conn: &rusqlite::Connection, cache_id: i64, row: &EntryRow, stored_at: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO cache_entries (
            cache_id, request_key, method, request_url, response_url, status, status_text,
            response_type, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(cache_id, request_key) DO UPDATE SET
            method = excluded.method,
            request_url = excluded.request_url,
            response_url = excluded.response_url,
            status = excluded.status,
            status_text = excluded.status_text,
            response_type = excluded.response_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            cache_id,
            &row.request_key,
            &row.method,
            &row.request_url,
            &row.response_url,
            row.status,
            &row.status_text,
            row.response_type,
            &row.headers_json,
            &row.body,
            stored_at,
        ],
    )?;
    Ok(())
}

type RawResponse = (String, u16, String, String, String, Vec<u8>);

fn read_raw(row: &rusqlite::Row<'_>) -> Result<RawResponse, rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn decode(raw: RawResponse) -> Result<Response, Error> {
    let (url, status, status_text, response_type, headers_json, body) = raw;
    let response_type =
        ResponseType::parse(&response_type).ok_or_else(|| Error::CorruptEntry(format!("response type {response_type}")))?;
    let headers: Vec<(String, String)> =
        serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    Ok(Response { url, status, status_text, headers, body: Bytes::from(body), response_type })
}

impl Namespace {
    pub(crate) fn new(db: CacheDb, name: &str) -> Self {
        Self { db, name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response for a request, replacing any previous entry.
    ///
    /// Concurrent writes to the same key are last-write-wins.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("{} requests are not cacheable", request.method())));
        }
        let name = self.name.clone();
        let row = EntryRow::new(request, response)?;
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let cache_id = ensure_namespace(conn, &name)?;
                upsert_entry(conn, cache_id, &row, &stored_at)
            })
            .await
            .map_err(Error::from)
    }

    /// Store every pair in one transaction: either all entries land or none do.
    pub async fn put_all(&self, pairs: &[(Request, Response)]) -> Result<(), Error> {
        if let Some((request, _)) = pairs.iter().find(|(r, _)| !r.is_get()) {
            return Err(Error::InvalidInput(format!("{} requests are not cacheable", request.method())));
        }
        let name = self.name.clone();
        let rows = pairs
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let cache_id = ensure_namespace(&tx, &name)?;
                for row in &rows {
                    upsert_entry(&tx, cache_id, row, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request in this namespace only.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let name = self.name.clone();
        let key = request_key(request);
        let raw = self
            .db
            .conn
            .call(move |conn| -> Result<Option<RawResponse>, Error> {
                let sql = format!("{SELECT_RESPONSE} WHERE s.cache_name = ?1 AND e.request_key = ?2");
                Ok(conn.query_row(&sql, params![name, key], read_raw).optional()?)
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode).transpose()
    }

    /// Remove the entry for a request. Returns false if there was none.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let name = self.name.clone();
        let key = request_key(request);
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE request_key = ?1
                     AND cache_id = (SELECT id FROM cache_storage WHERE cache_name = ?2)",
                    params![key, name],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Summaries of every stored entry, ordered by request URL.
    pub async fn entries(&self) -> Result<Vec<EntrySummary>, Error> {
        let name = self.name.clone();
        let rows = self
            .db
            .conn
            .call(move |conn| -> Result<Vec<(String, String, u16, String, i64, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.method, e.request_url, e.status, e.response_type, length(e.body), e.stored_at
                     FROM cache_entries e JOIN cache_storage s ON s.id = e.cache_id
                     WHERE s.cache_name = ?1 ORDER BY e.request_url ASC",
                )?;
                let rows = stmt
                    .query_map(params![name], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(method, request_url, status, response_type, body_len, stored_at)| {
                let response_type = ResponseType::parse(&response_type)
                    .ok_or_else(|| Error::CorruptEntry(format!("response type {response_type}")))?;
                Ok(EntrySummary { method, request_url, status, response_type, body_len: body_len as usize, stored_at })
            })
            .collect()
    }
}

impl CacheDb {
    /// Look up a request across every namespace, oldest namespace first.
    ///
    /// During the activation window this can return a stale copy from a
    /// namespace that is about to be deleted.
    pub async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        let key = request_key(request);
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawResponse>, Error> {
                let sql = format!("{SELECT_RESPONSE} WHERE e.request_key = ?1 ORDER BY s.id ASC LIMIT 1");
                Ok(conn.query_row(&sql, params![key], read_raw).optional()?)
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(path: &str) -> Request {
        Request::get(Url::parse("http://localhost:8000/").unwrap().join(path).unwrap())
    }

    fn ok(body: &'static [u8]) -> Response {
        Response {
            url: "http://localhost:8000/".into(),
            status: 200,
            status_text: "OK".into(),
            headers: vec![("content-type".into(), "text/css".into())],
            body: Bytes::from_static(body),
            response_type: ResponseType::Basic,
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-v1").await.unwrap();
        let req = get("/static/css/sales.css");
        let res = ok(b"body { margin: 0 }");

        ns.put(&req, &res).await.unwrap();

        let stored = ns.match_request(&req).await.unwrap().unwrap();
        assert_eq!(stored, res);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-runtime").await.unwrap();
        assert!(ns.match_request(&get("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-runtime").await.unwrap();
        let req = get("/dashboard/");

        ns.put(&req, &ok(b"old")).await.unwrap();
        ns.put(&req, &ok(b"new")).await.unwrap();

        let stored = ns.match_request(&req).await.unwrap().unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"new"));
        assert_eq!(ns.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-runtime").await.unwrap();
        let req = Request::new("POST", Url::parse("http://localhost:8000/checkout/").unwrap());

        assert!(matches!(ns.put(&req, &ok(b"")).await, Err(Error::InvalidInput(_))));
        assert!(ns.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_all_rejects_non_get_without_writing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-v1").await.unwrap();
        let pairs = vec![
            (get("/"), ok(b"home")),
            (Request::new("PUT", Url::parse("http://localhost:8000/x").unwrap()), ok(b"x")),
        ];

        assert!(ns.put_all(&pairs).await.is_err());
        assert!(ns.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_all_stores_every_pair() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-v1").await.unwrap();
        let pairs = vec![(get("/"), ok(b"home")), (get("/static/js/sales.js"), ok(b"js"))];

        ns.put_all(&pairs).await.unwrap();

        let entries = ns.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request_url, "http://localhost:8000/");
        assert_eq!(entries[1].body_len, 2);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let precache = db.open_namespace("personal-trainer-v1").await.unwrap();
        let runtime = db.open_namespace("personal-trainer-runtime").await.unwrap();
        let req = get("/");

        precache.put(&req, &ok(b"home")).await.unwrap();

        assert!(runtime.match_request(&req).await.unwrap().is_none());
        assert!(precache.match_request(&req).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open_namespace("personal-trainer-v1").await.unwrap();
        let new = db.open_namespace("personal-trainer-v2").await.unwrap();
        let req = get("/");

        new.put(&req, &ok(b"v2")).await.unwrap();
        old.put(&req, &ok(b"v1")).await.unwrap();

        let hit = db.match_any(&req).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"v1"));
    }

    #[tokio::test]
    async fn test_delete_namespace_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-v0").await.unwrap();
        let req = get("/");
        ns.put(&req, &ok(b"home")).await.unwrap();

        db.delete_namespace("personal-trainer-v0").await.unwrap();

        assert!(db.match_any(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("personal-trainer-runtime").await.unwrap();
        let req = get("/static/img/logo.png");
        ns.put(&req, &ok(b"png")).await.unwrap();

        assert!(ns.delete(&req).await.unwrap());
        assert!(!ns.delete(&req).await.unwrap());
    }
}
