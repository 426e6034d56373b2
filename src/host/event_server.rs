//! In-process host server.
//!
//! # Responsibilities
//! - Keep ordered request/upgrade handler lists
//! - Fan incoming traffic out to the current handlers
//! - Refuse handler changes once closed
//!
//! # Design Decisions
//! - Handler lists are copy-on-write snapshots (`ArcSwap`); emission never
//!   blocks registration and sees a consistent list
//! - Emission is synchronous, in registration order

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::host::{Category, HostError, HostServer, RequestHandler, UpgradeHandler};
use crate::http::{IncomingRequest, Responder, UpgradeSocket};

/// A host server that dispatches to handlers held in memory.
///
/// The HTTP binding ([`crate::http::HttpServer`]) feeds real traffic into one
/// of these; tests drive it directly.
pub struct EventServer {
    requests: ArcSwap<Vec<RequestHandler>>,
    upgrades: ArcSwap<Vec<UpgradeHandler>>,
    closed: AtomicBool,
}

impl EventServer {
    /// Create a server with no handlers.
    pub fn new() -> Self {
        Self {
            requests: ArcSwap::from_pointee(Vec::new()),
            upgrades: ArcSwap::from_pointee(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Deliver a plain request to every registered request handler.
    ///
    /// Returns false if no handler was registered.
    pub fn emit_request(&self, request: Arc<IncomingRequest>, response: Responder) -> bool {
        let handlers = self.requests.load_full();
        for handler in handlers.iter() {
            handler(Arc::clone(&request), response.clone());
        }
        !handlers.is_empty()
    }

    /// Deliver an upgrade attempt to every registered upgrade handler.
    ///
    /// Returns false if no handler was registered.
    pub fn emit_upgrade(
        &self,
        request: Arc<IncomingRequest>,
        socket: UpgradeSocket,
        head: &[u8],
    ) -> bool {
        let handlers = self.upgrades.load_full();
        for handler in handlers.iter() {
            handler(Arc::clone(&request), socket.clone(), head);
        }
        !handlers.is_empty()
    }

    /// Number of handlers registered for a category.
    pub fn listener_count(&self, category: Category) -> usize {
        match category {
            Category::Request => self.requests.load().len(),
            Category::Upgrade => self.upgrades.load().len(),
        }
    }

    /// Stop accepting handler changes. Already registered handlers keep
    /// receiving traffic.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Closed);
        }
        Ok(())
    }
}

impl Default for EventServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventServer")
            .field("request_listeners", &self.listener_count(Category::Request))
            .field("upgrade_listeners", &self.listener_count(Category::Upgrade))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl HostServer for EventServer {
    fn request_listeners(&self) -> Result<Vec<RequestHandler>, HostError> {
        Ok(self.requests.load().as_ref().clone())
    }

    fn upgrade_listeners(&self) -> Result<Vec<UpgradeHandler>, HostError> {
        Ok(self.upgrades.load().as_ref().clone())
    }

    fn remove_all_listeners(&self, category: Category) -> Result<(), HostError> {
        self.ensure_open()?;
        match category {
            Category::Request => self.requests.store(Arc::new(Vec::new())),
            Category::Upgrade => self.upgrades.store(Arc::new(Vec::new())),
        }
        Ok(())
    }

    fn on_request(&self, handler: RequestHandler) -> Result<(), HostError> {
        self.ensure_open()?;
        self.requests.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&handler));
            next
        });
        Ok(())
    }

    fn on_upgrade(&self, handler: UpgradeHandler) -> Result<(), HostError> {
        self.ensure_open()?;
        self.upgrades.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&handler));
            next
        });
        Ok(())
    }
}
