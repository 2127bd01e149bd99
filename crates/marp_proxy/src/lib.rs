//! Serves the resources of a workspace over a loopback HTTP port.
//!
//! The exporter's headless browser can not read virtual filesystems, so it is
//! pointed at this proxy instead. A request for `/images/a.png?v=1` is answered
//! with the contents of `<workspace root>/images/a.png?v=1`, read through the
//! host's [`FileSystem`].

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::TypedHeader;
use headers::{ContentLength, ContentType, LastModified};
use marp_themes::FileSystem;
use percent_encoding::percent_decode_str;
use rand::Rng;
use std::net::{Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use url::Url;

/// Ports the proxy picks from.
pub const PORT_RANGE: RangeInclusive<u16> = 8192..=18191;

const MAX_BIND_ATTEMPTS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(
        "no free port in {start}..={end} after {attempts} attempts",
        start = PORT_RANGE.start(),
        end = PORT_RANGE.end()
    )]
    NoAvailablePort { attempts: usize },

    #[error("proxy server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Binds a loopback listener on a random port of [`PORT_RANGE`], trying
/// another port while the chosen one is taken.
pub async fn bind_random_port() -> Result<TcpListener, ProxyError> {
    for attempt in 1..=MAX_BIND_ATTEMPTS {
        let port = rand::thread_rng().gen_range(PORT_RANGE);
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) => {
                tracing::debug!(port, attempt, ?err, "Port unavailable, trying another one");
            }
        }
    }

    Err(ProxyError::NoAvailablePort {
        attempts: MAX_BIND_ATTEMPTS,
    })
}

/// Maps the path and query of a request onto a resource below `root`.
///
/// Returns `None` if the path climbs above `root`.
pub fn resolve_resource(root: &Url, path: &str, query: Option<&str>) -> Option<Url> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match percent_decode_str(segment).decode_utf8().ok()?.as_ref() {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment),
        }
    }

    let mut resource = root.clone();
    let root_path = root.path().trim_end_matches('/');
    resource.set_path(&format!("{root_path}/{}", segments.join("/")));
    resource.set_query(query);
    resource.set_fragment(None);
    Some(resource)
}

#[derive(Clone)]
struct WorkspaceProxy {
    root: Url,
    fs: Arc<dyn FileSystem>,
}

async fn serve_resource(State(proxy): State<WorkspaceProxy>, uri: Uri) -> Response {
    let Some(resource) = resolve_resource(&proxy.root, uri.path(), uri.query()) else {
        tracing::debug!(%uri, "Rejected request outside of the workspace");
        return StatusCode::NOT_FOUND.into_response();
    };

    let stat = match proxy.fs.stat(&resource).await {
        Ok(stat) if !stat.is_directory() => stat,
        Ok(_) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::debug!(%resource, ?err, "Failed to stat proxied resource");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let body = match proxy.fs.read(&resource).await {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(%resource, ?err, "Failed to read proxied resource");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let mime = mime_guess::from_path(resource.path()).first_or_octet_stream();

    (
        StatusCode::OK,
        TypedHeader(ContentType::from(mime)),
        TypedHeader(ContentLength(body.len() as u64)),
        TypedHeader(LastModified::from(stat.mtime)),
        body,
    )
        .into_response()
}

/// Router answering every GET request with a resource of `root`.
pub fn router(root: Url, fs: Arc<dyn FileSystem>) -> Router {
    Router::new()
        .route("/", get(serve_resource))
        .route("/*path", get(serve_resource))
        .with_state(WorkspaceProxy { root, fs })
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}

/// A running proxy server.
pub struct ProxyServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ProxyServer {
    /// Starts serving `root` on a random port of [`PORT_RANGE`].
    pub async fn start(root: Url, fs: Arc<dyn FileSystem>) -> Result<Self, ProxyError> {
        let listener = bind_random_port().await?;
        Self::serve(listener, root, fs)
    }

    /// Starts serving `root` on an already bound listener.
    pub fn serve(
        listener: TcpListener,
        root: Url,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, ProxyError> {
        let addr = listener.local_addr()?;
        let app = router(root.clone(), fs);
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::debug!(%addr, %root, "Workspace proxy listening");

        Ok(Self {
            addr,
            shutdown,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub async fn shutdown(self) -> Result<(), ProxyError> {
        let _ = self.shutdown.send(());
        self.task.await??;
        tracing::debug!(addr = %self.addr, "Workspace proxy stopped");
        Ok(())
    }
}
