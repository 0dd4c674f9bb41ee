//! # waypoint-naming
//!
//! Turns a logical service name into a live, continuously updated set of
//! network addresses.
//!
//! This crate provides:
//! - `Resolver` trait implemented by every resolver variant
//! - `PassthroughResolver` for names the transport resolves itself
//! - `DnsResolver` polling SRV then A/AAAA records
//! - `DiscoResolver` bridging a discovery `Agent` to address updates
//! - `Registry` mapping URI schemes to watcher builders, and `UriResolver`
//!
//! ## Name syntax
//!
//! `scheme://authority/path?query` or a bare `host[:port]`, which is
//! resolved with the registry's default scheme. Built-in schemes:
//! - `dns:///host:port?freq=<seconds>` (or `dns://host:port`)
//! - `disco://service?tag=eu&tag=v2`
//! - `passthrough://host:port`

mod config;
mod disco;
mod dns;
mod passthrough;
mod registry;
mod resolver;
mod target;
mod uri;

pub use config::{DnsConfig, NamingConfig};
pub use disco::{DiscoResolver, DiscoWatcher};
pub use dns::{AddrDelta, DnsResolver, DnsWatcher, HickoryLookup, Lookup, SrvTarget};
pub use passthrough::{OnceWatcher, PassthroughResolver};
pub use registry::{Builder, Registry};
pub use resolver::Resolver;
pub use target::{Target, parse_target};
pub use uri::UriResolver;
