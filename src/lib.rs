//! HTTP request interception.
//!
//! A [`Dispatcher`] installs itself in front of a host server's request and
//! upgrade handlers, claims traffic under a base path for its transport, and
//! chains everything else to the handlers that were there before it.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod transports;

pub use config::InterceptorConfig;
pub use dispatch::{DispatchError, Dispatcher, Transport};
pub use host::{EventServer, HostServer};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
