//! Live-reload proxy server.
//!
//! Every request that isn't one of the server's own endpoints is forwarded
//! to the upstream site. HTML responses get the live-reload client injected
//! and the upstream origin rewritten to the proxy's.
//!
//! ```text
//! browser ──> assetflow (host:port) ──> upstream (config.proxy)
//!    ^                │
//!    └── websocket <──┴── ReloadHandle (reload / css / notify)
//! ```

pub mod tls;

use assetflow_core::{Config, ReloadHandle, ReloadMessage};
use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// URL of the injected client script.
pub const CLIENT_PATH: &str = "/__assetflow/client.js";
/// URL of the live-reload websocket.
pub const WS_PATH: &str = "/__assetflow/ws";

const CLIENT_JS: &str = include_str!("client.js");

/// Shared by every request handler.
struct ProxyState {
    client: reqwest::Client,
    /// Upstream origin, e.g. `http://localhost`.
    upstream: String,
    /// Origin browsers use to reach this server.
    public_origin: String,
    reload: ReloadHandle,
    notify: bool,
}

/// A bound, not yet running, dev server.
pub struct DevServer {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    app: Router,
    url: String,
}

impl DevServer {
    /// Load the certificate pair and bind `host:port`.
    ///
    /// Both steps are fatal on failure.
    pub async fn bind(config: &Config, reload: ReloadHandle) -> Result<Self> {
        let acceptor = tls::load_acceptor(&config.https)?;
        Self::bind_with(config, reload, Some(acceptor)).await
    }

    async fn bind_with(
        config: &Config,
        reload: ReloadHandle,
        tls: Option<TlsAcceptor>,
    ) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to bind {}:{}", config.host, config.port))?;
        let local: SocketAddr = listener.local_addr().into_diagnostic()?;

        let scheme = if tls.is_some() { "https" } else { "http" };
        let url = format!("{scheme}://{}:{}", config.host, local.port());

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .build()
            .into_diagnostic()?;

        let state = Arc::new(ProxyState {
            client,
            upstream: upstream_origin(&config.proxy),
            public_origin: url.clone(),
            reload,
            notify: config.notify,
        });

        Ok(Self {
            listener,
            tls,
            app: router(state),
            url,
        })
    }

    /// Public URL of the server.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> Result<()> {
        match self.tls {
            Some(acceptor) => tls::serve(self.listener, acceptor, self.app).await,
            None => axum::serve(self.listener, self.app)
                .await
                .into_diagnostic(),
        }
    }
}

fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route(CLIENT_PATH, get(serve_client))
        .route(WS_PATH, get(reload_websocket))
        .fallback(proxy)
        .with_state(state)
}

/// `localhost` → `http://localhost`; explicit schemes are kept.
fn upstream_origin(proxy: &str) -> String {
    let proxy = proxy.trim_end_matches('/');
    if proxy.starts_with("http://") || proxy.starts_with("https://") {
        proxy.to_string()
    } else {
        format!("http://{proxy}")
    }
}

async fn serve_client() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_JS,
    )
}

async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ProxyState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_reload_socket(socket, state))
}

async fn handle_reload_socket(mut socket: WebSocket, state: Arc<ProxyState>) {
    let mut rx = state.reload.subscribe();
    debug!(browsers = state.reload.connections(), "Browser connected");

    if socket
        .send(Message::Text(ReloadMessage::Connected.to_json()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(ReloadMessage::Notify { .. }) if !state.notify => {}
                Ok(msg) => {
                    if socket.send(Message::Text(msg.to_json())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Browser fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Browser disconnected");
}

async fn proxy(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    let target = req.uri().to_string();
    match forward(&state, req).await {
        Ok(response) => response,
        Err(e) => {
            warn!(uri = %target, error = %e, "Proxy request failed");
            (
                StatusCode::BAD_GATEWAY,
                format!("assetflow: upstream {} unavailable: {e}", state.upstream),
            )
                .into_response()
        }
    }
}

async fn forward(state: &ProxyState, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = format!("{}{path}", state.upstream);
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::Body(e.to_string()))?;

    let upstream = state
        .client
        .request(parts.method, &url)
        .headers(request_headers(&parts.headers))
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let headers = response_headers(upstream.headers(), &state.upstream, &state.public_origin);
    let is_html = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));

    let bytes = upstream.bytes().await?;
    let body = if is_html {
        let html = String::from_utf8_lossy(&bytes);
        let html = rewrite_origin(&html, &state.upstream, &state.public_origin);
        Bytes::from(inject_client(&html))
    } else {
        bytes
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[derive(Debug, thiserror::Error)]
enum ProxyError {
    #[error("{0}")]
    Upstream(#[from] reqwest::Error),
    #[error("failed to read request body: {0}")]
    Body(String),
}

/// Connection-scoped headers that never cross a proxy.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn request_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len());
    for (name, value) in incoming {
        // Upstream must see its own host and send an uncompressed body we can rewrite.
        if is_hop_by_hop(name) || name == header::HOST || name == header::ACCEPT_ENCODING {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn response_headers(upstream: &HeaderMap, from: &str, to: &str) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        if name == header::LOCATION {
            if let Some(rewritten) = value
                .to_str()
                .ok()
                .map(|loc| rewrite_origin(loc, from, to))
                .and_then(|loc| HeaderValue::from_str(&loc).ok())
            {
                headers.append(name.clone(), rewritten);
                continue;
            }
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Replace `from` with `to` wherever it appears as a whole origin (not
/// followed by more host or port characters).
fn rewrite_origin(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(from) {
        let after = &rest[idx + from.len()..];
        let continues_host = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
        out.push_str(&rest[..idx]);
        out.push_str(if continues_host { from } else { to });
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Add the client script before the last `</body>`, or at the end.
fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script async src="{CLIENT_PATH}"></script>"#);
    if html.contains(CLIENT_PATH) {
        return html.to_string();
    }
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{tag}"),
    }
}

/// Open a URL in the default browser.
pub fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }
    info!(url, "Opened browser");
    Ok(())
}
