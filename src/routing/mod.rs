//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request target
//!     → Location (pathname, query), written once on the request
//!     → matcher.rs (base path prefix check)
//!     → Return: claimed / unclaimed
//! ```
//!
//! # Design Decisions
//! - Base path fixed at install time, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same target always yields the same answer

pub mod matcher;

pub use matcher::{BasePath, BasePathError};
