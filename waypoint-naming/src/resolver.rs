//! Resolver trait.

use waypoint_core::{NamingError, Watcher};

/// Trait implemented by every resolver variant.
///
/// A resolver turns a target into a [`Watcher`] that reports the address set
/// of that target. Building the watcher may start background work but never
/// performs the first lookup; that happens on the first `next` call.
pub trait Resolver: Send + Sync {
    /// Create a watcher for `target`.
    fn resolve(&self, target: &str) -> Result<Box<dyn Watcher>, NamingError>;
}
