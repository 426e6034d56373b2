//! HTTP server binding.
//!
//! # Responsibilities
//! - Create the Axum Router that feeds every request into an [`EventServer`]
//! - Split plain requests from protocol upgrades
//! - Wait for whichever handler answers
//! - Wire up middleware (tracing, request timeout)
//! - Serve with graceful shutdown
//!
//! # Design Decisions
//! - One catch-all route; classification belongs to the handlers, not Axum
//! - A request nobody answers is held until the timeout layer fires, so the
//!   client sees the server's timeout rather than a made-up response
//! - Upgrades carry hyper's `OnUpgrade`; the head buffer handed to upgrade
//!   handlers is empty because hyper keeps early bytes inside the upgraded IO
//!   (see `hyper::upgrade::Parts::read_buf` after the takeover)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use hyper::upgrade::OnUpgrade;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::InterceptorConfig;
use crate::host::EventServer;
use crate::http::request::{wants_upgrade, IncomingRequest};
use crate::http::response::Responder;
use crate::http::websocket::UpgradeSocket;

/// HTTP server that hands every request to an [`EventServer`].
pub struct HttpServer {
    router: Router,
    host: Arc<EventServer>,
    config: InterceptorConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and an empty host.
    pub fn new(config: InterceptorConfig) -> Self {
        let host = Arc::new(EventServer::new());
        let router = Self::build_router(&config, Arc::clone(&host));
        Self {
            router,
            host,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &InterceptorConfig, host: Arc<EventServer>) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(host)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The host handlers are registered on.
    pub fn host(&self) -> Arc<EventServer> {
        Arc::clone(&self.host)
    }

    /// A clone of the router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until a
    /// shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: emit the request on the host and wait for an answer.
async fn dispatch_handler(State(host): State<Arc<EventServer>>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (responder, rx) = Responder::channel();

    let upgrade = if wants_upgrade(&parts.headers) {
        parts.extensions.remove::<OnUpgrade>()
    } else {
        None
    };

    let mut incoming = IncomingRequest::from_parts(parts, body);
    if let Some(peer) = peer {
        incoming = incoming.with_peer(peer);
    }
    let request = Arc::new(incoming);
    let request_id = request.id();

    let handled = match upgrade {
        Some(on_upgrade) => {
            let socket = UpgradeSocket::new(peer, responder, Some(on_upgrade));
            host.emit_upgrade(request, socket, &[])
        }
        None => host.emit_request(request, responder),
    };

    tracing::trace!(request_id = %request_id, handled, "Request emitted");

    match rx.await {
        Ok(response) => response,
        Err(_) => {
            tracing::debug!(request_id = %request_id, "No handler answered, holding until timeout");
            std::future::pending::<Response>().await
        }
    }
}
