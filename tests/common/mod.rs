//! Throwaway HTTP responder for end-to-end runs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use reference_retriever::config::{Config, ServiceName};

#[derive(Clone)]
struct Route {
    path: String,
    status: u16,
    content_type: String,
    body: Vec<u8>,
}

/// A request as the server saw it; `head` is lowercased
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub head: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn has_header(&self, name: &str, value: &str) -> bool {
        let line = format!("{}: {}", name, value).to_lowercase();
        self.head.lines().any(|l| l.trim() == line)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Default)]
struct State {
    routes: Mutex<Vec<Route>>,
    requests: AtomicUsize,
    log: Mutex<Vec<Recorded>>,
}

/// Serves canned responses by exact path (query string ignored); anything else is a 404
pub struct TestServer {
    pub base: String,
    state: Arc<State>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(State::default());

        let shared = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = shared.clone();
                tokio::spawn(async move {
                    let _ = handle(stream, state).await;
                });
            }
        });

        Self { base, state }
    }

    fn add(&self, path: &str, status: u16, content_type: &str, body: Vec<u8>) {
        self.state.routes.lock().unwrap().push(Route {
            path: path.to_string(),
            status,
            content_type: content_type.to_string(),
            body,
        });
    }

    /// A fake PDF of exactly `size` bytes
    pub fn pdf(&self, path: &str, size: usize) {
        let mut body = b"%PDF-1.4\n".to_vec();
        body.resize(size.max(body.len()), b'0');
        body.truncate(size);
        self.add(path, 200, "application/pdf", body);
    }

    pub fn json(&self, path: &str, body: &str) {
        self.add(path, 200, "application/json", body.as_bytes().to_vec());
    }

    pub fn text(&self, path: &str, content_type: &str, body: &str) {
        self.add(path, 200, content_type, body.as_bytes().to_vec());
    }

    pub fn status(&self, path: &str, status: u16) {
        self.add(path, status, "text/plain", b"unavailable".to_vec());
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Requests served so far, matched or not
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Requests received for `path`, in arrival order
    pub fn received(&self, path: &str) -> Vec<Recorded> {
        self.state
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

async fn handle(mut stream: TcpStream, state: Arc<State>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    state.requests.fetch_add(1, Ordering::SeqCst);

    let split = buf.windows(4).position(|w| w == b"\r\n\r\n").unwrap_or(0) + 4;
    let head = String::from_utf8_lossy(&buf[..split]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let chunked = head.contains("transfer-encoding: chunked");
    let mut body = buf[split..].to_vec();
    while body.len() < content_length || (chunked && !body.ends_with(b"0\r\n\r\n")) {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let target = String::from_utf8_lossy(&buf[..split])
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();
    let path = target.split('?').next().unwrap_or("/").to_string();
    state.log.lock().unwrap().push(Recorded {
        path: path.clone(),
        head,
        body,
    });

    let route = state
        .routes
        .lock()
        .unwrap()
        .iter()
        .find(|r| r.path == path)
        .cloned()
        .unwrap_or(Route {
            path,
            status: 404,
            content_type: "text/plain".to_string(),
            body: b"not found".to_vec(),
        });

    let header = format!(
        "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        route.content_type,
        route.body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&route.body).await?;
    stream.shutdown().await
}

/// Configuration with every service endpoint pointed at `base`
pub fn config_for(base: &str) -> Config {
    let mut config = Config {
        contact_email: "tests@example.org".to_string(),
        max_threads: 3,
        ..Config::default()
    };
    config.grobid.enabled = false;
    config.endpoints.arxiv_pdf = format!("{}/arxiv", base);
    config.endpoints.unpaywall = format!("{}/unpaywall", base);
    config.endpoints.openalex = format!("{}/openalex", base);
    config.endpoints.semantic_scholar = format!("{}/s2", base);
    config.endpoints.crossref = format!("{}/crossref", base);
    config.endpoints.pubmed_eutils = format!("{}/eutils", base);
    config.endpoints.pmc_articles = format!("{}/pmc", base);
    config.endpoints.core = format!("{}/core", base);
    // keep runs fast
    for svc in config.services.values_mut() {
        svc.rate_limit = 100.0;
        svc.timeout_secs = 5;
    }
    config
}

/// Same, with only the listed services enabled
pub fn config_with_only(base: &str, enabled: &[ServiceName]) -> Config {
    let mut config = config_for(base);
    for (name, svc) in config.services.iter_mut() {
        svc.enabled = enabled.contains(name);
    }
    config
}
