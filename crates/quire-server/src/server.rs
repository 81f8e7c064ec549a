//! Snapshot file server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use quire_static::{BuildError, StaticBuilder, INDEX_FILE};

use crate::monitor::{Monitor, Rebuild, DEFAULT_QUIET_WINDOW};
use crate::snapshot::SnapshotHandle;
use crate::watcher::WatchSet;

/// Configuration for serving a site.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Address to listen on
    pub address: SocketAddr,

    /// User source directory to watch; `None` serves the initial build only
    pub watch: Option<PathBuf>,

    /// Quiet window before a rebuild starts
    pub quiet: Duration,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 4567)),
            watch: None,
            quiet: DEFAULT_QUIET_WINDOW,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Initial build failed: {0}")]
    InitialBuild(#[from] BuildError),

    #[error("File watch error: {0}")]
    Watch(String),

    #[error("Failed to bind to {0}: {1}")]
    Bind(SocketAddr, String),
}

/// Router serving every path from the current snapshot.
pub fn router(handle: SnapshotHandle) -> Router {
    Router::new().fallback(serve_file).with_state(handle)
}

async fn serve_file(State(handle): State<SnapshotHandle>, uri: Uri) -> Response {
    let path = snapshot_path(uri.path());
    let snapshot = handle.current().await;

    match snapshot.get(&path) {
        Some(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                bytes.to_vec(),
            )
                .into_response()
        }
        None => {
            tracing::debug!("Not found: {}", path);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Map a request path onto a snapshot path.
///
/// Percent escapes are decoded; a path that does not decode to UTF-8 is kept as sent.
fn snapshot_path(request: &str) -> String {
    let decoded = percent_decode_str(request)
        .decode_utf8()
        .map_or_else(|_| request.to_string(), |path| path.into_owned());
    let trimmed = decoded.trim_start_matches('/');
    if trimmed.is_empty() {
        INDEX_FILE.to_string()
    } else if trimmed.ends_with('/') {
        format!("{trimmed}{INDEX_FILE}")
    } else {
        trimmed.to_string()
    }
}

/// Build once, then serve the result, rebuilding on changes when watching.
///
/// A failed initial build is returned; later rebuild failures only log.
pub async fn serve(builder: StaticBuilder, config: ServeConfig) -> Result<(), ServerError> {
    let initial = builder.rebuild()?;
    tracing::info!("Initial build ready ({} files)", initial.len());

    let handle = SnapshotHandle::new(initial);

    if let Some(root) = &config.watch {
        let (watch_set, events) = WatchSet::new(root)?;
        tracing::info!("Watching {}", root.display());

        let monitor = Monitor::new(builder, handle.clone(), config.quiet);
        tokio::spawn(async move {
            monitor.run(events).await;
            drop(watch_set);
        });
    }

    let listener = tokio::net::TcpListener::bind(config.address)
        .await
        .map_err(|e| ServerError::Bind(config.address, e.to_string()))?;

    tracing::info!("Serving at http://{}", config.address);

    axum::serve(listener, router(handle))
        .await
        .map_err(|e| ServerError::Bind(config.address, e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use quire_static::{MemoryOutput, OutputFs, SiteSnapshot};

    fn handle() -> SnapshotHandle {
        let out = MemoryOutput::new();
        out.write_file("index.html", b"<h1>Hi</h1>").unwrap();
        out.create_dir_all("stylesheets").unwrap();
        out.write_file("stylesheets/screen.css", b"body{}").unwrap();
        SnapshotHandle::new(out.into_snapshot())
    }

    async fn get(handle: &SnapshotHandle, path: &str) -> Response {
        serve_file(State(handle.clone()), path.parse().unwrap()).await
    }

    #[test]
    fn maps_request_paths() {
        assert_eq!(snapshot_path("/"), "index.html");
        assert_eq!(snapshot_path("/docs/"), "docs/index.html");
        assert_eq!(snapshot_path("/scripts/all.js"), "scripts/all.js");
        assert_eq!(snapshot_path("/images/my%20logo.png"), "images/my logo.png");
        assert_eq!(snapshot_path("/caf%C3%A9/"), "café/index.html");
        assert_eq!(snapshot_path("/bad%FF.png"), "bad%FF.png");
    }

    #[tokio::test]
    async fn serves_percent_encoded_names() {
        let out = MemoryOutput::new();
        out.create_dir_all("images").unwrap();
        out.write_file("images/my logo.png", b"png").unwrap();
        let handle = SnapshotHandle::new(out.into_snapshot());

        let response = get(&handle, "/images/my%20logo.png").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"png");
    }

    #[tokio::test]
    async fn serves_index_at_root() {
        let response = get(&handle(), "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>Hi</h1>");
    }

    #[tokio::test]
    async fn guesses_content_type() {
        let response = get(&handle(), "/stylesheets/screen.css").await;

        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let response = get(&handle(), "/nope.js").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_latest_publish() {
        let handle = handle();
        handle.publish(SiteSnapshot::default()).await;

        let response = get(&handle, "/").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
