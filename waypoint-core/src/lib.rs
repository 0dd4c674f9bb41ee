//! # waypoint-core
//!
//! Core types, traits, and error definitions for Waypoint name resolution.
//!
//! This crate provides:
//! - Error types (`NamingError`, `DiscoError`)
//! - Cancellable lifetime scopes (`Scope`)
//! - The address-level update vocabulary (`Update`, `Op`)
//! - The `Watcher` blocking-iterator contract

mod error;
mod scope;
mod update;
mod watcher;

pub use error::{DiscoError, NamingError};
pub use scope::Scope;
pub use update::{Metadata, Op, Update, join_host_port};
pub use watcher::{WatchFuture, Watcher};
