//! # Waypoint
//!
//! Service naming and discovery for RPC clients.
//!
//! Waypoint provides:
//! - **Watchers** that stream batches of address additions and deletions
//! - **Pluggable resolvers** selected by URI scheme: `passthrough`, `dns`, `disco`
//! - **Service discovery** through an agent with tag filtering and change events
//! - **Transport adapter** turning address updates into socket endpoints
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use waypoint::{Agent, LocalAgent, NamingConfig, Registration, Registry, Scope};
//!
//! let agent = LocalAgent::new();
//! agent
//!     .register(Registration::new("payments", "10.0.0.1", 8080))
//!     .unwrap();
//!
//! let registry = Registry::with_defaults(Arc::new(agent), &NamingConfig::default());
//! assert_eq!(registry.schemes(), ["disco", "dns", "passthrough"]);
//!
//! let scope = Scope::new();
//! let watcher = registry.resolve(&scope, "disco://payments").unwrap();
//! # drop(watcher);
//! ```
//!
//! ## Architecture
//!
//! Waypoint is composed of several crates:
//!
//! - [`waypoint-core`] - Updates, the watcher trait, scopes and errors
//! - [`waypoint-disco`] - Discovery agent, subscriptions and the diff engine
//! - [`waypoint-naming`] - Resolvers and the scheme registry
//! - [`waypoint-discovery`] - Endpoint resolution for transports

// Re-export core types
pub use waypoint_core::{
    DiscoError, Metadata, NamingError, Op, Scope, Update, WatchFuture, Watcher, join_host_port,
};

// Re-export discovery agent
pub use waypoint_disco::{
    Agent, Diff, Event, EventOp, Filter, Instance, LocalAgent, Registration, Service, Subscription,
};

// Re-export naming
pub use waypoint_naming::{
    AddrDelta, Builder, DiscoResolver, DnsConfig, DnsResolver, HickoryLookup, Lookup,
    NamingConfig, PassthroughResolver, Registry, Resolver, Target, UriResolver, parse_target,
};

// Re-export transport adapter
pub use waypoint_discovery::{
    Change, Endpoint, EndpointResolver, EndpointSet, NamingResolver, ResolveError,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use waypoint::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Agent, NamingError, Registry, Resolver, Scope, Update, Watcher};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
