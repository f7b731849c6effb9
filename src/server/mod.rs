// src/server/mod.rs

//! Development HTTP server with live reload.
//!
//! Serves the output tree as the document root, mounts manifest-derived
//! static routes straight from the source tree, and exposes a WebSocket at
//! `/__sitemill_ws` where the runtime publishes change notifications.

pub mod reload;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as AxumPath, State as AxumState};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::pipeline::statics::StaticRoute;
use crate::pipeline::BuildContext;

pub use reload::{ReloadHub, ReloadMessage};

/// Shared state behind the router.
#[derive(Debug, Clone)]
pub struct ServerState {
    output_root: PathBuf,
    /// Manifest-derived mounts served from the source tree.
    routes: Vec<StaticRoute>,
    hub: ReloadHub,
    /// Whether HTML responses get the reload client spliced in.
    inject_reload: bool,
}

impl ServerState {
    pub fn new(ctx: &BuildContext, hub: ReloadHub) -> Self {
        Self {
            output_root: ctx.paths.output_root.clone(),
            routes: ctx.manifest.routes(&ctx.paths.source_root),
            hub,
            inject_reload: ctx.mode.is_development(),
        }
    }
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/__sitemill_ws", get(ws_reload))
        .route("/", get(route_index))
        .route("/{*path}", get(route_any))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind and run the server until the process ends.
pub async fn serve(state: ServerState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding dev server to {addr}"))?;
    info!("dev server listening on http://{addr}");

    axum::serve(listener, router)
        .await
        .context("dev server failed")?;
    Ok(())
}

async fn route_index(AxumState(state): AxumState<Arc<ServerState>>) -> Response {
    serve_path(&state, "").await
}

async fn route_any(
    AxumPath(path): AxumPath<String>,
    AxumState(state): AxumState<Arc<ServerState>>,
) -> Response {
    serve_path(&state, &path).await
}

async fn serve_path(state: &ServerState, raw_path: &str) -> Response {
    let rel = match sanitize_rel_path(raw_path) {
        Some(rel) => rel,
        None => return (StatusCode::BAD_REQUEST, "invalid path").into_response(),
    };

    // Document root first; directories fall back to their index.html.
    let mut candidate = state.output_root.join(&rel);
    if rel.as_os_str().is_empty() || candidate.is_dir() {
        candidate = candidate.join("index.html");
    }
    if candidate.is_file() {
        return respond_file(state, &candidate).await;
    }

    let request_path = format!("/{}", rel.to_string_lossy().replace('\\', "/"));
    for mount in &state.routes {
        let Some(remainder) = request_path.strip_prefix(&mount.route) else {
            continue;
        };
        let Some(remainder) = remainder.strip_prefix('/') else {
            continue;
        };
        if remainder.is_empty() {
            continue;
        }
        let file = mount.dir.join(remainder);
        if file.is_file() {
            return respond_file(state, &file).await;
        }
    }

    not_found(state).await
}

/// Everything unmatched gets the project's 404 page, served as-is.
async fn not_found(state: &ServerState) -> Response {
    let page = state.output_root.join("404.html");
    match tokio::fs::read(&page).await {
        Ok(bytes) => respond_bytes(bytes, "text/html; charset=utf-8"),
        Err(_) => {
            warn!("no 404.html in the output tree");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn respond_file(state: &ServerState, path: &Path) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = ?path, error = %err, "failed to read file");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read file").into_response();
        }
    };

    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
    let bytes = if state.inject_reload && ext == "html" {
        match String::from_utf8(bytes) {
            Ok(html) => inject_reload_script(html).into_bytes(),
            Err(err) => err.into_bytes(),
        }
    } else {
        bytes
    };

    respond_bytes(bytes, content_type_for(ext))
}

fn respond_bytes(bytes: Vec<u8>, content_type: &str) -> Response {
    let mut response = bytes.into_response();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

/// Reject traversal and absolute components outright.
fn sanitize_rel_path(path: &str) -> Option<PathBuf> {
    let trimmed = path.trim_start_matches('/');
    let rel = PathBuf::from(trimmed);
    for comp in rel.components() {
        if matches!(
            comp,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return None;
        }
    }
    Some(rel)
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "webmanifest" => "application/manifest+json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn inject_reload_script(mut html: String) -> String {
    if html.contains("/__sitemill_ws") {
        return html;
    }

    let script = r#"<script>
(function(){
  var reconnectTimer = null;

  function connect(){
    var proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
    var ws = new WebSocket(proto + location.host + '/__sitemill_ws');

    ws.onmessage = function(){
      location.reload();
    };

    ws.onclose = function(){
      if (reconnectTimer) clearTimeout(reconnectTimer);
      reconnectTimer = setTimeout(connect, 600);
    };

    ws.onerror = function(){
      try { ws.close(); } catch (_) {}
    };
  }

  connect();
})();
</script>"#;

    if let Some(idx) = html.rfind("</body>") {
        html.insert_str(idx, script);
    } else {
        html.push_str(script);
    }

    html
}

async fn ws_reload(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_reload_socket(socket, state))
}

async fn handle_reload_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();
    debug!("browser connected to reload socket");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
            next = rx.recv() => {
                match next {
                    Ok(message) => {
                        let Ok(txt) = serde_json::to_string(&message) else {
                            continue;
                        };
                        if socket.send(Message::Text(txt.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("browser disconnected from reload socket");
}
