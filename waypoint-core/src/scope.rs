//! Cancellable lifetime scopes for watchers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Global scope ID counter for unique IDs.
static SCOPE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique scope ID.
fn next_scope_id() -> u64 {
    SCOPE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Lifetime scope bound to every long-running watch.
///
/// A `Scope` ends when it is cancelled or when its deadline passes.
/// Cancelling a scope cancels every child derived from it, but a child can
/// be cancelled on its own without touching the parent. Watchers own a child
/// of the scope they were built with, so closing one watcher leaves its
/// siblings running while cancelling the parent closes them all.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Unique identifier, used to correlate diagnostics.
    pub id: u64,

    /// Identifier of the scope this one was derived from.
    pub parent_id: Option<u64>,

    /// Absolute deadline. If `None`, the scope only ends on cancellation.
    pub deadline: Option<Instant>,

    token: CancellationToken,
}

impl Scope {
    /// Create a new root scope without deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: next_scope_id(),
            parent_id: None,
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Create a root scope that ends after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Create a root scope with an absolute deadline.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::new()
        }
    }

    /// Derive a child scope. It inherits the deadline and is cancelled along
    /// with this scope.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            id: next_scope_id(),
            parent_id: Some(self.id),
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    /// End this scope and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check whether the scope has ended.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.is_expired()
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Get remaining time until deadline.
    /// Returns `None` if no deadline is set or deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .and_then(|d| d.checked_duration_since(Instant::now()))
    }

    /// Wait until the scope is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
