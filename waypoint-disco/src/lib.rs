//! # waypoint-disco
//!
//! Service discovery primitives for Waypoint.
//!
//! This crate provides:
//! - `Instance` and `Registration` types
//! - `Event` vocabulary (add, update, delete over one instance)
//! - `Diff` for adapting snapshot-based sources to incremental events
//! - `Agent` trait and the in-process `LocalAgent`
//! - `Subscription` for watching catalogue changes

mod agent;
mod diff;
mod event;
mod instance;
mod subscription;

pub use agent::{Agent, LocalAgent, Service};
pub use diff::Diff;
pub use event::{Event, EventOp};
pub use instance::{Instance, Registration};
pub use subscription::{Filter, Subscription};
