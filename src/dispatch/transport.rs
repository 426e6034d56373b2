//! Transport extension point.

use crate::dispatch::{DispatchError, Dispatcher};

/// Protocol-specific plugin built on a [`Dispatcher`].
///
/// A transport registers its claimed-event subscribers (and any host
/// augmentation it needs) in [`Transport::setup`], which runs before the
/// dispatcher captures the host's handlers. Subscribers registered there
/// decide which categories the dispatcher attaches to.
pub trait Transport: Send + Sync + 'static {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Called once during [`Dispatcher::install`].
    fn setup(&self, _dispatcher: &Dispatcher) -> Result<(), DispatchError> {
        Ok(())
    }
}
