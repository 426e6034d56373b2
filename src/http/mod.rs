//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, upgrade detection)
//!     → request.rs (request ID, shared head, location annotation)
//!     → EventServer handlers (dispatcher first, previous handlers behind it)
//!     → response.rs (first answer wins) / websocket.rs (upgrade takeover)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{IncomingRequest, Location, X_REQUEST_ID};
pub use response::{Responder, ResponseReceiver};
pub use server::HttpServer;
pub use websocket::{accept_websocket, ServerWebSocket, UpgradeError, UpgradeSocket};
