//! Resolver trait and common types.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_core::Stream;
use waypoint_core::{Metadata, NamingError};

/// Error type for resolution operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// The name could not be resolved.
    #[error("naming error: {0}")]
    Naming(#[from] NamingError),

    /// An announced address is not a usable socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The name resolved to an empty address set.
    #[error("no endpoints for {0}")]
    NoEndpoints(String),
}

/// A service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Socket address of the endpoint.
    pub addr: SocketAddr,

    /// Weight for load balancing (higher = more traffic).
    pub weight: u32,

    /// Priority (lower = preferred).
    pub priority: u32,

    /// Optional metadata.
    pub metadata: Option<Arc<HashMap<String, String>>>,
}

impl Endpoint {
    /// Create a new endpoint with default weight and priority.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            weight: 100,
            priority: 0,
            metadata: None,
        }
    }

    /// Create an endpoint with weight.
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Create an endpoint with priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach metadata. `weight` and `priority` keys, when numeric,
    /// override the defaults.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        if let Some(weight) = metadata.get("weight").and_then(|w| w.parse().ok()) {
            self.weight = weight;
        }
        if let Some(priority) = metadata.get("priority").and_then(|p| p.parse().ok()) {
            self.priority = priority;
        }
        self.metadata = Some(Arc::new(metadata));
        self
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

/// Trait for transport-facing resolvers.
///
/// Implementations resolve service names to endpoints and optionally
/// watch for changes.
pub trait EndpointResolver: Send + Sync + 'static {
    /// Resolve a service name to a list of endpoints.
    fn resolve(
        &self,
        service: &str,
    ) -> impl Future<Output = Result<Vec<Endpoint>, ResolveError>> + Send;

    /// Watch for changes to a service's endpoints.
    ///
    /// Returns a stream that yields the full endpoint list whenever
    /// it changes.
    fn watch(&self, service: &str) -> impl Stream<Item = Vec<Endpoint>> + Send + Unpin;
}
