//! In-memory network double for lifecycle tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::Error;
use crate::http::{Fetcher, Request, Response, ResponseType};

/// Serves canned responses by URL and records every request it sees.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, (u16, Bytes)>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, status: u16, body: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, Bytes::from_static(body.as_bytes())));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetcher for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url().to_string();
        self.calls.lock().unwrap().push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("connection refused: {url}")))?;

        Ok(Response {
            url,
            status,
            status_text: String::new(),
            headers: vec![("content-type".into(), "text/plain".into())],
            body,
            response_type: ResponseType::Basic,
        })
    }
}

/// Serve every default precache resource with a small body.
pub fn serve_default_precache(net: &FakeNetwork) {
    net.serve("http://localhost:8000/", 200, "<html>home</html>");
    net.serve("http://localhost:8000/static/css/sales.css", 200, "body{}");
    net.serve("http://localhost:8000/static/js/sales.js", 200, "console.log(1)");
    net.serve("http://localhost:8000/static/manifest.json", 200, "{\"name\":\"Personal Trainer\"}");
    net.serve(
        "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700;800&display=swap",
        200,
        "@font-face{}",
    );
    net.serve(
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css",
        200,
        ".fa{}",
    );
}
