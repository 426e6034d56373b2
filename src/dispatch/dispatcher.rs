//! Request-interception dispatcher.
//!
//! # Responsibilities
//! - Install in front of a host server, capturing its existing handlers
//! - Classify each request against the base path
//! - Chain unclaimed traffic to the captured handlers, in order
//! - Emit claimed traffic to subscribers
//!
//! # Design Decisions
//! - Captured handlers are immutable after install
//! - The host is held weakly; the host's handlers keep the dispatcher alive
//! - A category is only attached when someone cares about it
//! - Upgrade heads are copied before anything else looks at them
//! - A failed install puts the host's handlers back

use std::sync::{Arc, OnceLock, Weak};

use axum::body::Bytes;

use crate::dispatch::{DispatchError, Transport};
use crate::events::{
    noop, Continuation, Emitter, Event, ListenerId, LogRecord, Logger, LOG, REQUEST, UNKNOWN,
    UPGRADE,
};
use crate::host::{
    request_handler, upgrade_handler, Category, HostError, HostServer, RequestHandler,
    UpgradeHandler,
};
use crate::http::{IncomingRequest, Responder, UpgradeSocket};
use crate::observability::metrics::{self, Outcome};
use crate::routing::BasePath;

/// Handlers the host had before the dispatcher took over.
struct Previous {
    requests: Vec<RequestHandler>,
    upgrades: Vec<UpgradeHandler>,
}

/// Sits in front of a host server and routes each request either to its own
/// subscribers or to whatever handled requests before it.
pub struct Dispatcher {
    server: Weak<dyn HostServer>,
    base_path: BasePath,
    events: Emitter,
    previous: OnceLock<Previous>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Install a dispatcher for `transport` in front of `server`.
    ///
    /// The transport's setup hook runs first. Then the host's request and
    /// upgrade handlers are captured and removed, and the dispatcher is
    /// registered for each category that has a captured handler or a
    /// subscriber.
    pub fn install<T: Transport>(
        server: Arc<dyn HostServer>,
        base_path: impl Into<String>,
        transport: T,
    ) -> Result<Arc<Self>, DispatchError> {
        let base_path = BasePath::new(base_path)?;
        let dispatcher = Arc::new(Self {
            server: Arc::downgrade(&server),
            base_path,
            events: Emitter::new(),
            previous: OnceLock::new(),
            transport: Arc::new(transport),
        });

        dispatcher.transport.setup(&dispatcher)?;

        let previous = Previous {
            requests: server.request_listeners()?,
            upgrades: server.upgrade_listeners()?,
        };

        let attach_request =
            !previous.requests.is_empty() || dispatcher.events.listener_count(REQUEST) > 0;
        let attach_upgrade =
            !previous.upgrades.is_empty() || dispatcher.events.listener_count(UPGRADE) > 0;

        tracing::info!(
            transport = dispatcher.transport.name(),
            base_path = %dispatcher.base_path,
            previous_requests = previous.requests.len(),
            previous_upgrades = previous.upgrades.len(),
            attach_request,
            attach_upgrade,
            "Installing dispatcher"
        );

        // Freshly built above, so the slot is always empty here.
        let _ = dispatcher.previous.set(previous);

        let mut removed = Vec::with_capacity(2);
        if let Err(err) = Self::take_over(
            &dispatcher,
            server.as_ref(),
            attach_request,
            attach_upgrade,
            &mut removed,
        ) {
            dispatcher.restore(server.as_ref(), &removed);
            return Err(err.into());
        }

        Ok(dispatcher)
    }

    /// Remove the host's handlers and attach the dispatcher in their place.
    ///
    /// Each category is pushed onto `removed` as soon as the host has
    /// dropped its handlers, so a failure can be rolled back.
    fn take_over(
        dispatcher: &Arc<Self>,
        server: &dyn HostServer,
        attach_request: bool,
        attach_upgrade: bool,
        removed: &mut Vec<Category>,
    ) -> Result<(), HostError> {
        for category in [Category::Request, Category::Upgrade] {
            server.remove_all_listeners(category)?;
            removed.push(category);
        }

        if attach_request {
            let this = Arc::clone(dispatcher);
            server.on_request(request_handler(move |request, response| {
                this.request(request, response)
            }))?;
        }

        if attach_upgrade {
            let this = Arc::clone(dispatcher);
            server.on_upgrade(upgrade_handler(move |request, socket, head| {
                this.upgrade(request, socket, head)
            }))?;
        }

        Ok(())
    }

    /// Put the captured handlers back for every category already taken over.
    fn restore(&self, server: &dyn HostServer, removed: &[Category]) {
        for &category in removed {
            let result = server
                .remove_all_listeners(category)
                .and_then(|()| match category {
                    Category::Request => self
                        .previous_requests()
                        .iter()
                        .try_for_each(|handler| server.on_request(Arc::clone(handler))),
                    Category::Upgrade => self
                        .previous_upgrades()
                        .iter()
                        .try_for_each(|handler| server.on_upgrade(Arc::clone(handler))),
                });

            if let Err(err) = result {
                tracing::warn!(%category, error = %err, "Failed to restore host handlers");
            }
        }
    }

    /// Handle a plain HTTP request.
    pub fn request(&self, request: Arc<IncomingRequest>, response: Responder) {
        if !self.test(&request) {
            let previous = self.previous_requests();
            if previous.is_empty() {
                tracing::debug!(request_id = %request.id(), "Unclaimed request dropped");
                metrics::record_dispatch(Category::Request, Outcome::Dropped, self.transport.name());
                return;
            }

            metrics::record_dispatch(Category::Request, Outcome::Chained, self.transport.name());
            for handler in previous {
                handler(Arc::clone(&request), response.clone());
            }
            return;
        }

        metrics::record_dispatch(Category::Request, Outcome::Claimed, self.transport.name());
        self.events.emit(&Event::Request {
            request,
            response,
            next: noop,
        });
    }

    /// Handle a protocol-upgrade attempt.
    ///
    /// `head` may be reused by the transport layer once this returns, so it
    /// is copied into a new buffer before classification.
    pub fn upgrade(&self, request: Arc<IncomingRequest>, socket: UpgradeSocket, head: &[u8]) {
        let head = Bytes::copy_from_slice(head);

        if !self.test(&request) {
            let previous = self.previous_upgrades();
            if previous.is_empty() {
                tracing::debug!(request_id = %request.id(), "Unclaimed upgrade dropped");
                metrics::record_dispatch(Category::Upgrade, Outcome::Dropped, self.transport.name());
                return;
            }

            metrics::record_dispatch(Category::Upgrade, Outcome::Chained, self.transport.name());
            for handler in previous {
                handler(Arc::clone(&request), socket.clone(), &head[..]);
            }
            return;
        }

        metrics::record_dispatch(Category::Upgrade, Outcome::Claimed, self.transport.name());
        self.events.emit(&Event::Upgrade {
            request,
            socket,
            head,
            next: noop,
        });
    }

    /// Check whether this dispatcher claims the request.
    ///
    /// Annotates the request with its location. Unclaimed requests are
    /// reported through an `unknown` event.
    pub fn test(&self, request: &Arc<IncomingRequest>) -> bool {
        let accepted = self.base_path.matches(request.annotate().pathname());

        tracing::trace!(
            request_id = %request.id(),
            path = %request.uri().path(),
            accepted,
            "Request classified"
        );

        if !accepted {
            self.events.emit(&Event::Unknown {
                request: Arc::clone(request),
            });
        }
        accepted
    }

    /// Subscribe to claimed requests: `(request, response, next)`.
    pub fn on_request<F>(&self, subscriber: F) -> ListenerId
    where
        F: Fn(&Arc<IncomingRequest>, &Responder, Continuation) + Send + Sync + 'static,
    {
        self.events.on(REQUEST, move |event| {
            if let Event::Request {
                request,
                response,
                next,
            } = event
            {
                subscriber(request, response, *next);
            }
        })
    }

    /// Subscribe to claimed upgrades: `(request, socket, head, next)`.
    pub fn on_upgrade<F>(&self, subscriber: F) -> ListenerId
    where
        F: Fn(&Arc<IncomingRequest>, &UpgradeSocket, &Bytes, Continuation) + Send + Sync + 'static,
    {
        self.events.on(UPGRADE, move |event| {
            if let Event::Upgrade {
                request,
                socket,
                head,
                next,
            } = event
            {
                subscriber(request, socket, head, *next);
            }
        })
    }

    /// Subscribe to requests outside the base path.
    pub fn on_unknown<F>(&self, subscriber: F) -> ListenerId
    where
        F: Fn(&Arc<IncomingRequest>) + Send + Sync + 'static,
    {
        self.events.on(UNKNOWN, move |event| {
            if let Event::Unknown { request } = event {
                subscriber(request);
            }
        })
    }

    /// Subscribe to every log record, whatever its severity.
    pub fn on_log<F>(&self, subscriber: F) -> ListenerId
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.events.on(LOG, move |event| {
            if let Event::Log(record) = event {
                subscriber(record);
            }
        })
    }

    /// Remove a subscription made through any `on_*` method.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        self.events.off(name, id)
    }

    /// The raw event registry.
    pub fn events(&self) -> &Emitter {
        &self.events
    }

    pub fn logger(&self) -> Logger<'_> {
        Logger::new(&self.events, self.transport.name())
    }

    pub fn base_path(&self) -> &BasePath {
        &self.base_path
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// The host this dispatcher was installed on, if it is still alive.
    pub fn server(&self) -> Option<Arc<dyn HostServer>> {
        self.server.upgrade()
    }

    pub fn previous_request_count(&self) -> usize {
        self.previous_requests().len()
    }

    pub fn previous_upgrade_count(&self) -> usize {
        self.previous_upgrades().len()
    }

    fn previous_requests(&self) -> &[RequestHandler] {
        self.previous
            .get()
            .map(|p| p.requests.as_slice())
            .unwrap_or(&[])
    }

    fn previous_upgrades(&self) -> &[UpgradeHandler] {
        self.previous
            .get()
            .map(|p| p.upgrades.as_slice())
            .unwrap_or(&[])
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport.name())
            .field("base_path", &self.base_path)
            .field("previous_requests", &self.previous_request_count())
            .field("previous_upgrades", &self.previous_upgrade_count())
            .field("events", &self.events)
            .finish()
    }
}
