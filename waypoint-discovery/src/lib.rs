//! # waypoint-discovery
//!
//! Adapter between Waypoint naming and RPC transports.
//!
//! This crate provides:
//! - `EndpointResolver` trait consumed by transports and connection pools
//! - `Endpoint` and `EndpointSet` types
//! - `Change`, the transport-facing form of an address update
//! - `NamingResolver`, which drives naming watchers to keep endpoints current

mod naming;
mod resolver;

pub use naming::{Change, EndpointSet, NamingResolver};
pub use resolver::{Endpoint, EndpointResolver, ResolveError};
