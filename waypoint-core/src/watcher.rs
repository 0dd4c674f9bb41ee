//! The watcher contract.
//!
//! A `Watcher` is a pull-based blocking iterator over address changes for
//! one name. Exactly one consumer drains it by calling [`Watcher::next`] in
//! a loop.

use std::future::Future;
use std::pin::Pin;

use crate::error::NamingError;
use crate::update::Update;

/// Future returned by [`Watcher::next`].
pub type WatchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Update>, NamingError>> + Send + 'a>>;

/// Trait for address-set watchers.
///
/// # Contract
///
/// - `next` waits until at least one change exists. The first call returns
///   the complete current state as `Add` updates, never an empty set.
/// - After `close`, or once the watcher's scope ends, `next` returns
///   [`NamingError::WatcherClosed`] without blocking, on every call.
/// - `close` is idempotent.
///
/// Closing from another task is done through the [`Scope`](crate::Scope)
/// the watcher was built with: cancelling it unblocks a pending `next`.
///
/// # Example
///
/// ```rust
/// use waypoint_core::{NamingError, Watcher};
///
/// async fn drain(mut watcher: Box<dyn Watcher>) -> Result<(), NamingError> {
///     loop {
///         match watcher.next().await {
///             Ok(updates) => {
///                 for update in updates {
///                     println!("{} {}", update.op, update.addr);
///                 }
///             }
///             Err(e) if e.is_closed() => return Ok(()),
///             Err(e) => return Err(e),
///         }
///     }
/// }
/// ```
pub trait Watcher: Send {
    /// Wait for the next batch of updates.
    fn next(&mut self) -> WatchFuture<'_>;

    /// Close the watcher and release its resources.
    fn close(&self);
}

impl<W: Watcher + ?Sized> Watcher for Box<W> {
    fn next(&mut self) -> WatchFuture<'_> {
        (**self).next()
    }

    fn close(&self) {
        (**self).close();
    }
}
