//! HTTP front door: the upstream relay, the health probe, the fragment
//! routes that drive the viewer and the static page.
//!
//! One acceptor thread pulls requests off the listener and hands them to a
//! fixed pool of workers over a channel. Routing is a pure function of the
//! method and URL so it can be tested without a socket.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use serde_json::json;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::Config;
use crate::endpoints::PROXY_PREFIX;
use crate::gateway::{ErrorBody, Gateway};
use crate::pipeline::{PanelUpdate, Pipeline};
use crate::session::{Action, SelectionState};

const HEALTH_PATH: &str = "/api/health";
const FRAGMENT_PREFIX: &str = "/fragments/";
const INDEX_FILE: &str = "index.html";

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Methods",
        "GET, POST, PUT, DELETE, OPTIONS",
    ),
    (
        "Access-Control-Allow-Headers",
        "Origin, X-Requested-With, Content-Type, Accept",
    ),
];

pub const PANEL_HEADER: &str = "X-Panel";
pub const SELECTION_HEADER: &str = "X-Selection";

/// `phase=pending` asks for the loading placeholder of an action without
/// running it.
const PHASE_PARAM: &str = "phase";
const PENDING_PHASE: &str = "pending";
/// Replaced in `index.html` with the configured input quiet period.
const DEBOUNCE_TOKEN: &str = "{{debounce_ms}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Preflight,
    Proxy {
        path: String,
        query: Vec<(String, String)>,
    },
    Health,
    Fragment {
        action: String,
        params: HashMap<String, String>,
    },
    Static(String),
    NotFound,
}

pub fn route(method: &Method, raw_url: &str) -> Route {
    if *method == Method::Options {
        return Route::Preflight;
    }
    if *method != Method::Get {
        return Route::NotFound;
    }

    let (path, query) = raw_url.split_once('?').unwrap_or((raw_url, ""));
    if let Some(rest) = path.strip_prefix(PROXY_PREFIX) {
        if rest.starts_with('/') {
            return Route::Proxy {
                path: rest.to_string(),
                query: query_pairs(query),
            };
        }
    }
    if path == HEALTH_PATH {
        return Route::Health;
    }
    if let Some(action) = path.strip_prefix(FRAGMENT_PREFIX) {
        if action.is_empty() || action.contains('/') {
            return Route::NotFound;
        }
        return Route::Fragment {
            action: action.to_string(),
            params: query_pairs(query).into_iter().collect(),
        };
    }
    if path == "/api" || path.starts_with("/api/") {
        return Route::NotFound;
    }
    if path == "/" {
        return Route::Static(INDEX_FILE.to_string());
    }
    Route::Static(path.trim_start_matches('/').to_string())
}

fn query_pairs(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// A response before it is handed to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    fn json(status: u16, body: Vec<u8>) -> Self {
        Self::new(status, JSON, body)
    }

    fn error(status: u16, body: ErrorBody) -> Self {
        Self::json(status, body.to_json())
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body).with_status_code(StatusCode(self.status));
        let headers = CORS_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .chain(self.headers);
        for (name, value) in headers {
            match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                Ok(header) => response.add_header(header),
                Err(()) => warn!(%name, "dropping header with invalid value"),
            }
        }
        response
    }
}

struct Inner {
    gateway: Arc<Gateway>,
    pipeline: Pipeline<Arc<Gateway>>,
    static_dir: PathBuf,
}

impl Inner {
    fn worker(&self, jobs: Receiver<tiny_http::Request>) {
        for request in jobs.iter() {
            self.respond(request);
        }
    }

    fn respond(&self, request: tiny_http::Request) {
        let started = Instant::now();
        let method = request.method().clone();
        let url = request.url().to_string();
        let reply = self.handle(&method, &url);
        debug!(%method, %url, status = reply.status, elapsed = ?started.elapsed(), "request handled");
        if let Err(err) = request.respond(reply.into_response()) {
            warn!(%url, error = %err, "failed to write response");
        }
    }

    fn handle(&self, method: &Method, url: &str) -> Reply {
        match route(method, url) {
            Route::Preflight => Reply::no_content(),
            Route::Proxy { path, query } => {
                let relay = self.gateway.forward(&path, &query);
                Reply::json(relay.status, relay.body)
            }
            Route::Health => Reply::json(
                200,
                json!({"status": "OK", "message": "RedInsight API is running"}).to_string().into_bytes(),
            ),
            Route::Fragment { action, params } => self.fragment(&action, &params),
            Route::Static(relative) => self
                .static_file(&relative)
                .unwrap_or_else(|| not_found(method, url)),
            Route::NotFound => not_found(method, url),
        }
    }

    fn fragment(&self, name: &str, params: &HashMap<String, String>) -> Reply {
        let parsed = SelectionState::from_params(params)
            .and_then(|state| Action::parse(name, params).map(|action| (state, action)));
        let (state, action) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(action = %name, error = %err, "rejecting fragment request");
                return Reply::error(400, ErrorBody::new("Bad request", err.to_string()));
            }
        };

        if params.get(PHASE_PARAM).map(String::as_str) == Some(PENDING_PHASE) {
            return match self.pipeline.preview(state, action) {
                (state, Some(update)) => panel_reply(&state, update),
                (_, None) => Reply::no_content(),
            };
        }

        let (state, update) = self.pipeline.dispatch(state, action);
        panel_reply(&state, update)
    }

    fn static_file(&self, relative: &str) -> Option<Reply> {
        let path = resolve_static(&self.static_dir, relative)?;
        let mut bytes = fs::read(&path).ok()?;
        if relative == INDEX_FILE {
            bytes = self.render_index(bytes);
        }
        let content_type = content_type(&path, &bytes);
        Some(Reply::new(200, &content_type, bytes))
    }

    fn render_index(&self, bytes: Vec<u8>) -> Vec<u8> {
        match String::from_utf8(bytes) {
            Ok(page) => page
                .replace(
                    DEBOUNCE_TOKEN,
                    &self.pipeline.debounce().as_millis().to_string(),
                )
                .into_bytes(),
            Err(err) => err.into_bytes(),
        }
    }
}

fn panel_reply(state: &SelectionState, update: PanelUpdate) -> Reply {
    Reply::new(200, HTML, update.html.into_string().into_bytes())
        .with_header(PANEL_HEADER, update.panel.element_id())
        .with_header(SELECTION_HEADER, state.to_query())
        .with_header(
            "Access-Control-Expose-Headers",
            format!("{PANEL_HEADER}, {SELECTION_HEADER}"),
        )
}

fn not_found(method: &Method, url: &str) -> Reply {
    let path = url.split_once('?').map_or(url, |(path, _)| path);
    Reply::error(404, ErrorBody::new("Not found", format!("{method} {path}")))
}

/// Joins a request path onto the static root, refusing anything that could
/// climb out of it.
fn resolve_static(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

fn content_type(path: &Path, bytes: &[u8]) -> String {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let known = match ext.as_deref() {
        Some("html") | Some("htm") => HTML,
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => JSON,
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => tree_magic_mini::from_u8(bytes),
    };
    known.to_string()
}

/// A running server. Dropping it stops accepting and drains the workers.
pub struct Handle {
    server: Arc<Server>,
    addr: SocketAddr,
    acceptor: Option<thread::JoinHandle<()>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Handle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Blocks until the acceptor exits.
    pub fn wait(mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        self.join_workers();
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.server.unblock();
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        self.join_workers();
    }

    fn join_workers(&mut self) {
        while let Some(handle) = self.workers.pop() {
            let _ = handle.join();
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn start(config: &Config, gateway: Arc<Gateway>) -> Result<Handle> {
    let listen_addr = config.listen_addr();
    let server = Server::http(&listen_addr)
        .map_err(|err| anyhow!("server: listen on {}: {}", listen_addr, err))?;
    let addr = server
        .server_addr()
        .to_ip()
        .context("server: listener has no ip address")?;
    let server = Arc::new(server);

    let inner = Arc::new(Inner {
        pipeline: Pipeline::new(gateway.clone(), &config.client),
        gateway,
        static_dir: config.server.static_dir.clone(),
    });

    let workers = config.server.workers.max(1);
    let (job_tx, job_rx) = unbounded();
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let rx = job_rx.clone();
        let worker_inner = inner.clone();
        handles.push(thread::spawn(move || worker_inner.worker(rx)));
    }

    let accept_server = server.clone();
    let acceptor = thread::spawn(move || {
        for request in accept_server.incoming_requests() {
            if job_tx.send(request).is_err() {
                break;
            }
        }
    });

    info!(%addr, workers, static_dir = %config.server.static_dir.display(), "RedInsight server listening");
    Ok(Handle {
        server,
        addr,
        acceptor: Some(acceptor),
        workers: handles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn routes_proxy_with_query() {
        assert_eq!(
            route(&Method::Get, "/api/reddit/r/rust/top?limit=25&t=week"),
            Route::Proxy {
                path: "/r/rust/top".into(),
                query: vec![
                    ("limit".into(), "25".into()),
                    ("t".into(), "week".into())
                ],
            }
        );
        assert_eq!(route(&Method::Get, "/api/redditx"), Route::NotFound);
    }

    #[test]
    fn routes_health_fragments_and_static() {
        assert_eq!(route(&Method::Get, "/api/health"), Route::Health);
        assert_eq!(route(&Method::Get, "/api/unknown"), Route::NotFound);
        assert_eq!(route(&Method::Get, "/"), Route::Static("index.html".into()));
        assert_eq!(
            route(&Method::Get, "/css/site.css?v=2"),
            Route::Static("css/site.css".into())
        );
        match route(&Method::Get, "/fragments/search?q=rust+lang&type=users") {
            Route::Fragment { action, params } => {
                assert_eq!(action, "search");
                assert_eq!(params.get("q").map(String::as_str), Some("rust lang"));
            }
            other => panic!("unexpected route {other:?}"),
        }
        assert_eq!(route(&Method::Get, "/fragments/"), Route::NotFound);
    }

    #[test]
    fn only_get_and_options_are_served() {
        assert_eq!(route(&Method::Options, "/anything"), Route::Preflight);
        assert_eq!(route(&Method::Post, "/api/reddit/hot"), Route::NotFound);
        assert_eq!(route(&Method::Delete, "/"), Route::NotFound);
    }

    #[test]
    fn static_paths_cannot_escape_root() {
        let root = Path::new("/srv/static");
        assert_eq!(
            resolve_static(root, "css/site.css"),
            Some(PathBuf::from("/srv/static/css/site.css"))
        );
        assert_eq!(resolve_static(root, "../secret"), None);
        assert_eq!(resolve_static(root, "a/../../b"), None);
        assert_eq!(resolve_static(root, "a//b"), None);
        assert_eq!(resolve_static(root, "..\\windows"), None);
    }

    #[test]
    fn content_type_prefers_extension_then_sniffs() {
        assert_eq!(content_type(Path::new("a.css"), b""), "text/css; charset=utf-8");
        assert_eq!(content_type(Path::new("INDEX.HTML"), b""), HTML);
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(content_type(Path::new("logo"), &png), "image/png");
    }

    #[test]
    fn replies_find_headers_case_insensitively() {
        let reply = Reply::json(200, b"{}".to_vec()).with_header(PANEL_HEADER, "posts-container");
        assert_eq!(reply.header("content-type"), Some(JSON));
        assert_eq!(reply.header("x-panel"), Some("posts-container"));
    }

    #[test]
    fn not_found_names_method_and_path() {
        let reply = not_found(&Method::Get, "/nope?x=1");
        assert_eq!(reply.status, 404);
        let body: ErrorBody = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(body, ErrorBody::new("Not found", "GET /nope"));
    }

    #[test]
    fn static_files_are_read_from_the_configured_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        let inner = Inner {
            gateway: Arc::new(Gateway::new(&Default::default()).unwrap()),
            pipeline: Pipeline::new(
                Arc::new(Gateway::new(&Default::default()).unwrap()),
                &Default::default(),
            ),
            static_dir: dir.path().to_path_buf(),
        };
        let reply = inner.handle(&Method::Get, "/");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("Content-Type"), Some(HTML));
        assert_eq!(reply.body, b"<h1>hi</h1>");
        assert_eq!(inner.handle(&Method::Get, "/missing.css").status, 404);
        assert_eq!(inner.handle(&Method::Options, "/api/health").status, 204);
    }

    fn inner_with(static_dir: PathBuf, client: &crate::config::ClientConfig) -> Inner {
        Inner {
            gateway: Arc::new(Gateway::new(&Default::default()).unwrap()),
            pipeline: Pipeline::new(Arc::new(Gateway::new(&Default::default()).unwrap()), client),
            static_dir,
        }
    }

    #[test]
    fn index_carries_the_configured_quiet_period() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("index.html"),
            "<script>const DEBOUNCE_MS = Number('{{debounce_ms}}') || 500;</script>",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "{{debounce_ms}}").unwrap();
        let client = crate::config::ClientConfig {
            debounce: std::time::Duration::from_millis(250),
            ..Default::default()
        };
        let inner = inner_with(dir.path().to_path_buf(), &client);

        let page = String::from_utf8(inner.handle(&Method::Get, "/").body).unwrap();
        assert!(page.contains("Number('250')"), "{page}");
        assert!(!page.contains("{{debounce_ms}}"));
        assert_eq!(inner.handle(&Method::Get, "/notes.txt").body, b"{{debounce_ms}}");
    }

    #[test]
    fn pending_phase_returns_loading_without_fetching() {
        let inner = inner_with(PathBuf::from("does-not-exist"), &Default::default());
        let reply = inner.handle(
            &Method::Get,
            "/fragments/posts-filter?section=posts&value=top&phase=pending",
        );
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header(PANEL_HEADER), Some("posts-container"));
        assert_eq!(
            reply.header(SELECTION_HEADER),
            Some("section=posts&filter=top&time=day&sfilter=popular")
        );
        let html = String::from_utf8(reply.body).unwrap();
        assert_eq!(html, crate::render::loading().into_string());

        let prompt = inner.handle(&Method::Get, "/fragments/navigate?section=users&phase=pending");
        assert_eq!(prompt.status, 204);
        assert!(prompt.body.is_empty());

        let rejected = inner.handle(&Method::Get, "/fragments/teleport?phase=pending");
        assert_eq!(rejected.status, 400);
    }

    #[test]
    fn bad_fragment_requests_are_rejected_without_fetching() {
        let inner = Inner {
            gateway: Arc::new(Gateway::new(&Default::default()).unwrap()),
            pipeline: Pipeline::new(
                Arc::new(Gateway::new(&Default::default()).unwrap()),
                &Default::default(),
            ),
            static_dir: PathBuf::from("does-not-exist"),
        };
        assert_eq!(inner.handle(&Method::Get, "/fragments/teleport").status, 400);
        assert_eq!(
            inner
                .handle(&Method::Get, "/fragments/posts-filter?value=sideways")
                .status,
            400
        );
        assert_eq!(
            inner
                .handle(&Method::Get, "/fragments/user?name=spez%3Fx%3D1")
                .status,
            400
        );
        let reply = inner.handle(&Method::Get, "/fragments/navigate?section=search&filter=top");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header(PANEL_HEADER), Some("search-results"));
        assert_eq!(
            reply.header(SELECTION_HEADER),
            Some("section=search&filter=top&time=day&sfilter=popular")
        );
    }
}
