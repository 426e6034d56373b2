//! Host server abstraction.
//!
//! # Data Flow
//! ```text
//! transport layer (hyper, tests, ...)
//!     → HostServer::emit_* (host-specific)
//!     → registered RequestHandler / UpgradeHandler, in registration order
//! ```
//!
//! # Design Decisions
//! - Two handler categories only: plain requests and protocol upgrades
//! - Handlers are shared `Arc<dyn Fn>` values so they can be captured and
//!   re-invoked by whoever takes over the category
//! - Every capability is fallible: a host may refuse a category or be closed

pub mod event_server;

use std::fmt;
use std::sync::Arc;

use crate::http::{IncomingRequest, Responder, UpgradeSocket};

pub use event_server::EventServer;

/// Callback for plain HTTP requests: `(request, response)`.
pub type RequestHandler = Arc<dyn Fn(Arc<IncomingRequest>, Responder) + Send + Sync>;

/// Callback for protocol upgrades: `(request, socket, head)`.
///
/// `head` borrows bytes owned by the transport layer and is only valid for
/// the duration of the call.
pub type UpgradeHandler = Arc<dyn Fn(Arc<IncomingRequest>, UpgradeSocket, &[u8]) + Send + Sync>;

/// Wrap a closure as a [`RequestHandler`].
pub fn request_handler<F>(handler: F) -> RequestHandler
where
    F: Fn(Arc<IncomingRequest>, Responder) + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// Wrap a closure as an [`UpgradeHandler`].
pub fn upgrade_handler<F>(handler: F) -> UpgradeHandler
where
    F: Fn(Arc<IncomingRequest>, UpgradeSocket, &[u8]) + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// Handler category exposed by a host server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Request,
    Upgrade,
}

impl Category {
    /// Event name used for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Request => "request",
            Category::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a host server's handler registry.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host does not expose handlers for this category.
    #[error("server does not support `{0}` listeners")]
    Unsupported(Category),

    /// The host no longer accepts handler changes.
    #[error("server is closed")]
    Closed,
}

/// The capabilities a dispatcher needs from the server it intercepts.
pub trait HostServer: Send + Sync {
    /// Currently registered request handlers, in registration order.
    fn request_listeners(&self) -> Result<Vec<RequestHandler>, HostError>;

    /// Currently registered upgrade handlers, in registration order.
    fn upgrade_listeners(&self) -> Result<Vec<UpgradeHandler>, HostError>;

    /// Remove every handler of the given category.
    fn remove_all_listeners(&self, category: Category) -> Result<(), HostError>;

    /// Append a request handler.
    fn on_request(&self, handler: RequestHandler) -> Result<(), HostError>;

    /// Append an upgrade handler.
    fn on_upgrade(&self, handler: UpgradeHandler) -> Result<(), HostError>;
}
