//! Echo transport.
//!
//! # Responsibilities
//! - Answer claimed HTTP requests with a JSON description of the request
//! - Accept claimed WebSocket upgrades and echo text/binary frames back
//!
//! # Design Decisions
//! - Subscribers stay synchronous; WebSocket sessions run on spawned tasks
//! - Non-WebSocket upgrades are rejected with 400 by the handshake helper

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::dispatch::{DispatchError, Dispatcher, Transport};
use crate::http::{accept_websocket, IncomingRequest, Responder, ServerWebSocket, UpgradeSocket};

/// Transport that reflects whatever it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoTransport;

impl EchoTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for EchoTransport {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn setup(&self, dispatcher: &Dispatcher) -> Result<(), DispatchError> {
        let transport = self.name();
        dispatcher.on_request(move |request, response, next| {
            describe(transport, request, response);
            next();
        });
        dispatcher.on_upgrade(|request, socket, _head, next| {
            spawn_session(Arc::clone(request), socket.clone());
            next();
        });

        dispatcher
            .logger()
            .debug(format!("echo transport claiming {}", dispatcher.base_path()));
        Ok(())
    }
}

fn describe(transport: &str, request: &IncomingRequest, response: &Responder) {
    let location = request.location();
    let query: serde_json::Map<String, serde_json::Value> = location
        .map(|l| l.query_pairs())
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();

    let body = json!({
        "transport": transport,
        "request_id": request.id().to_string(),
        "method": request.method().as_str(),
        "pathname": location.map(|l| l.pathname()).unwrap_or_else(|| request.uri().path()),
        "query": query,
    });

    response.send(Json(body).into_response());
}

fn spawn_session(request: Arc<IncomingRequest>, socket: UpgradeSocket) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(request_id = %request.id(), "No runtime to run the websocket session on");
        socket.respond(StatusCode::SERVICE_UNAVAILABLE.into_response());
        return;
    };

    runtime.spawn(async move {
        match accept_websocket(&request, &socket).await {
            Ok(ws) => echo(ws, request.id()).await,
            Err(e) => {
                tracing::warn!(request_id = %request.id(), error = %e, "WebSocket upgrade refused")
            }
        }
    });
}

async fn echo(mut ws: ServerWebSocket, request_id: Uuid) {
    let mut frames = 0u64;
    while let Some(message) = ws.next().await {
        match message {
            Ok(message) if message.is_text() || message.is_binary() => {
                frames += 1;
                if let Err(e) = ws.send(message).await {
                    tracing::debug!(request_id = %request_id, error = %e, "Echo send failed");
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }
    tracing::debug!(request_id = %request_id, frames, "WebSocket session closed");
}
