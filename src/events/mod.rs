//! Event facade.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → event.rs (request / upgrade / unknown / log / custom)
//!     → emitter.rs (name → ordered subscribers)
//!     → subscriber callbacks, synchronously
//!
//! Logger (logger.rs)
//!     → one `log` event per call + mirrored tracing event
//! ```
//!
//! # Design Decisions
//! - Registry owned by each dispatcher, no global state
//! - Emission is synchronous and fire-and-forget

pub mod emitter;
pub mod event;
pub mod logger;

pub use emitter::{Emitter, Listener, ListenerId};
pub use event::{noop, Continuation, Event, LogRecord, Severity, LOG, REQUEST, UNKNOWN, UPGRADE};
pub use logger::Logger;
