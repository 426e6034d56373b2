//! Upgrade sockets and WebSocket acceptance.
//!
//! # Responsibilities
//! - Represent the connection behind a protocol-upgrade attempt
//! - Let exactly one handler answer the handshake and take the raw stream
//! - Complete a WebSocket handshake on top of that (`accept_websocket`)
//!
//! # Data Flow
//! ```text
//! Client ── Upgrade request ──→ hyper ──→ UpgradeSocket { responder, OnUpgrade }
//!                                              │
//!             handler: socket.accept(101 response)
//!                                              ▼
//!                       Upgraded stream → tokio-tungstenite WebSocketStream
//! ```
//!
//! # Design Decisions
//! - The socket is shared by all handlers of one upgrade; whoever accepts
//!   first owns the stream
//! - Rejecting is just sending a non-101 response

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

use crate::http::request::IncomingRequest;
use crate::http::response::Responder;

/// WebSocket stream produced by [`accept_websocket`].
pub type ServerWebSocket = WebSocketStream<TokioIo<Upgraded>>;

/// Errors raised while taking over an upgrade.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Another handler already took the stream, or the transport offers none.
    #[error("connection is not available for upgrade")]
    Unavailable,

    /// The handshake response could not be delivered.
    #[error("handshake response was not delivered")]
    NotDelivered,

    /// The client did not send a valid WebSocket handshake.
    #[error("invalid websocket handshake: {0}")]
    Handshake(&'static str),

    #[error("failed to build handshake response: {0}")]
    Http(#[from] axum::http::Error),

    #[error("upgrade failed: {0}")]
    Hyper(#[from] hyper::Error),
}

struct SocketInner {
    peer: Option<SocketAddr>,
    responder: Responder,
    on_upgrade: Mutex<Option<OnUpgrade>>,
}

/// The connection behind an upgrade attempt. Cheap to clone.
#[derive(Clone)]
pub struct UpgradeSocket {
    inner: Arc<SocketInner>,
}

impl UpgradeSocket {
    pub fn new(peer: Option<SocketAddr>, responder: Responder, on_upgrade: Option<OnUpgrade>) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                peer,
                responder,
                on_upgrade: Mutex::new(on_upgrade),
            }),
        }
    }

    /// A socket with no connection behind it. Every response is discarded.
    pub fn detached() -> Self {
        let (responder, _) = Responder::channel();
        Self::new(None, responder, None)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer
    }

    /// Answer the upgrade attempt without switching protocols.
    pub fn respond(&self, response: Response<Body>) -> bool {
        self.inner.responder.send(response)
    }

    /// True once a handler has answered or accepted this upgrade.
    pub fn is_answered(&self) -> bool {
        self.inner.responder.is_sent()
    }

    /// Send the switching-protocols response and take the pending stream.
    ///
    /// The returned future resolves once hyper has handed over the connection.
    pub fn accept(&self, response: Response<Body>) -> Result<OnUpgrade, UpgradeError> {
        let on_upgrade = self
            .inner
            .on_upgrade
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(UpgradeError::Unavailable)?;

        if !self.inner.responder.send(response) {
            return Err(UpgradeError::NotDelivered);
        }
        Ok(on_upgrade)
    }
}

impl fmt::Debug for UpgradeSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .inner
            .on_upgrade
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("UpgradeSocket")
            .field("peer", &self.inner.peer)
            .field("pending", &pending)
            .finish()
    }
}

/// Validate a WebSocket handshake and compute the `Sec-WebSocket-Accept` value.
pub fn handshake_accept_key(request: &IncomingRequest) -> Result<String, UpgradeError> {
    let headers = request.headers();

    let is_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    if !is_websocket {
        return Err(UpgradeError::Handshake("upgrade header is not `websocket`"));
    }

    let version = headers
        .get(header::SEC_WEBSOCKET_VERSION)
        .and_then(|v| v.to_str().ok());
    if version != Some("13") {
        return Err(UpgradeError::Handshake("unsupported websocket version"));
    }

    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .ok_or(UpgradeError::Handshake("missing websocket key"))?;

    Ok(derive_accept_key(key.as_bytes()))
}

/// Complete a server-side WebSocket handshake on an upgrade socket.
pub async fn accept_websocket(
    request: &IncomingRequest,
    socket: &UpgradeSocket,
) -> Result<ServerWebSocket, UpgradeError> {
    let accept_key = match handshake_accept_key(request) {
        Ok(key) => key,
        Err(e) => {
            socket.respond(
                Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .body(Body::from(e.to_string()))?,
            );
            return Err(e);
        }
    };

    let response = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::CONNECTION, HeaderValue::from_static("upgrade"))
        .header(header::UPGRADE, HeaderValue::from_static("websocket"))
        .header(header::SEC_WEBSOCKET_ACCEPT, accept_key)
        .body(Body::empty())?;

    let upgraded = socket.accept(response)?.await?;
    tracing::debug!(request_id = %request.id(), "WebSocket handshake complete");

    Ok(WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await)
}
