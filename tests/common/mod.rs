//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http_interceptor::config::InterceptorConfig;
use http_interceptor::http::IncomingRequest;
use http_interceptor::lifecycle::Shutdown;
use http_interceptor::{EventServer, HttpServer};

/// Append-only log shared between handlers and assertions.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl Calls {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// A bodiless GET shared the way the host shares it.
#[allow(dead_code)]
pub fn get(target: &str) -> Arc<IncomingRequest> {
    Arc::new(IncomingRequest::get(target).unwrap())
}

/// Start an HTTP server on an ephemeral port.
///
/// `configure` runs against the host before the server starts accepting, so
/// tests can register handlers and install dispatchers.
#[allow(dead_code)]
pub async fn start_server<F>(config: InterceptorConfig, configure: F) -> (SocketAddr, Shutdown)
where
    F: FnOnce(Arc<EventServer>),
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config);
    configure(server.host());

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // The listener is already bound; give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}
