//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Install (once):
//!     Transport::setup → capture host handlers → remove them
//!     → attach dispatcher per category in use
//!
//! Per request / upgrade:
//!     (upgrade only) copy head bytes
//!     → test: annotate location, prefix match
//!     → unclaimed: `unknown` event, then previous handlers in order
//!     → claimed:   `request` / `upgrade` event to subscribers
//! ```

pub mod dispatcher;
pub mod error;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use transport::Transport;
