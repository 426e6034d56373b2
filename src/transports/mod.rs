//! Transports built on the dispatcher.
//!
//! Each transport claims traffic under the dispatcher's base path and
//! implements its own protocol on top of the claimed requests and upgrades.

pub mod echo;

pub use echo::EchoTransport;
