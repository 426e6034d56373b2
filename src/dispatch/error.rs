//! Dispatcher errors.

use crate::host::HostError;
use crate::routing::BasePathError;

/// Fatal configuration errors surfaced while installing a dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid base path: {0}")]
    BasePath(#[from] BasePathError),

    #[error("host server rejected the dispatcher: {0}")]
    Host(#[from] HostError),

    /// A transport's setup hook failed.
    #[error("transport `{transport}` setup failed: {reason}")]
    Setup {
        transport: &'static str,
        reason: String,
    },
}
