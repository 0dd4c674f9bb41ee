//! Scheme-dispatching resolver.

use std::sync::Arc;

use waypoint_core::{NamingError, Scope, Watcher};

use crate::registry::Registry;
use crate::resolver::Resolver;

/// Resolver that uses the target's URI scheme to pick the real resolver.
#[derive(Clone)]
pub struct UriResolver {
    scope: Scope,
    registry: Arc<Registry>,
}

impl UriResolver {
    /// Create a resolver dispatching through `registry`.
    #[must_use]
    pub fn new(scope: Scope, registry: Arc<Registry>) -> Self {
        Self { scope, registry }
    }
}

impl Resolver for UriResolver {
    fn resolve(&self, target: &str) -> Result<Box<dyn Watcher>, NamingError> {
        self.registry.resolve(&self.scope, target)
    }
}
