//! HTTP view of the status cache.
//!
//! Routes, with `root` normalized to start and end with `/`:
//! - `GET {root}` (and `{root}` without the trailing slash): the whole map
//! - `GET {root}{key}`: one value, `null` when absent
//! - `GET /links`: an HTML index of every key

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use cynic_core::{SnapshotConfig, StatusConfig};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::cache::StatusCache;
use crate::error::StatusError;
use crate::snapshot::SnapshotTimers;

pub const LINKS_PATH: &str = "/links";

/// Body served, with status 200, when the cache cannot be serialized.
pub const FORMAT_ERROR_BODY: &str = r#"{"error":"could not format status data"}"#;

const NO_LINKS_BODY: &str = "No links here yet.";

struct ServerState {
    cache: StatusCache,
    root: String,
}

/// Ensure `root` starts and ends with `/`.
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Build the status router for `cache` mounted at `root`.
pub fn router(cache: StatusCache, root: &str) -> Router {
    let root = normalize_root(root);
    let state = Arc::new(ServerState {
        cache,
        root: root.clone(),
    });

    let mut app = Router::new()
        .route(&root, get(status_all))
        .route(&format!("{root}{{*key}}"), get(status_key))
        .route(LINKS_PATH, get(links));
    if root != "/" {
        app = app.route(root.trim_end_matches('/'), get(status_all));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

async fn status_all(State(state): State<Arc<ServerState>>) -> Response {
    json_response(state.cache.to_json(None))
}

async fn status_key(State(state): State<Arc<ServerState>>, Path(key): Path<String>) -> Response {
    json_response(state.cache.to_json(Some(&key)))
}

async fn links(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(links_page(&state.root, &state.cache.keys()))
}

fn json_response(result: Result<String, StatusError>) -> Response {
    let body = match result {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "could not format status data");
            FORMAT_ERROR_BODY.to_string()
        }
    };
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn links_page(root: &str, keys: &[String]) -> String {
    if keys.is_empty() {
        return NO_LINKS_BODY.to_string();
    }
    let mut page = String::from("<html><body><ul>\n");
    for key in keys {
        let key = escape_html(key);
        page.push_str(&format!("<li><a href=\"{root}{key}\">{key}</a></li>\n"));
    }
    page.push_str("</ul></body></html>\n");
    page
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// A bound but not yet serving status server.
pub struct StatusServer {
    cache: StatusCache,
    listener: TcpListener,
    addr: SocketAddr,
    root: String,
    shutdown_timeout: Duration,
    snapshots: Option<SnapshotConfig>,
}

impl StatusServer {
    /// Bind the listener. Port 0 picks a free port; see [`StatusServer::port`].
    pub async fn bind(cache: StatusCache, config: &StatusConfig) -> Result<Self, StatusError> {
        let listener = TcpListener::bind(config.addr()).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            cache,
            listener,
            addr,
            root: normalize_root(&config.root),
            shutdown_timeout: config.shutdown_timeout(),
            snapshots: None,
        })
    }

    /// Also snapshot the cache periodically while serving. Zero intervals
    /// are rejected.
    pub fn with_snapshots(mut self, config: SnapshotConfig) -> Result<Self, StatusError> {
        config.validate()?;
        self.snapshots = Some(config);
        Ok(self)
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Start serving (and snapshotting, if configured) on background tasks.
    pub fn start(self) -> StatusServerHandle {
        let StatusServer {
            cache,
            listener,
            addr,
            root,
            shutdown_timeout,
            snapshots,
        } = self;
        let shutdown = Arc::new(Notify::new());
        let app = router(cache.clone(), &root);
        let snapshots = snapshots.map(|config| SnapshotTimers::start(cache, &config));

        let signal = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.notified().await })
                .await
        });

        info!(addr = %addr, root = %root, "status server listening");
        StatusServerHandle {
            addr,
            shutdown,
            server,
            snapshots,
            shutdown_timeout,
        }
    }

    /// Serve until `shutdown` resolves, then stop gracefully.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let handle = self.start();
        shutdown.await;
        handle.stop().await;
    }
}

/// A serving status server.
pub struct StatusServerHandle {
    addr: SocketAddr,
    shutdown: Arc<Notify>,
    server: JoinHandle<std::io::Result<()>>,
    snapshots: Option<SnapshotTimers>,
    shutdown_timeout: Duration,
}

impl StatusServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections and wait up to the shutdown timeout for
    /// in-flight requests, then stop the snapshot timers with a final dump.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        match tokio::time::timeout(self.shutdown_timeout, &mut self.server).await {
            Ok(Ok(Ok(()))) => info!(addr = %self.addr, "status server stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "status server exited with error"),
            Ok(Err(e)) => warn!(error = %e, "status server task panicked"),
            Err(_) => {
                warn!(
                    timeout = ?self.shutdown_timeout,
                    "status server did not drain in time; aborting"
                );
                self.server.abort();
            }
        }

        if let Some(timers) = self.snapshots.take() {
            timers.stop().await;
        }
    }
}
