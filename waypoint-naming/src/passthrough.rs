//! Passthrough resolution.
//!
//! The target is handed over untouched and resolved by the transport.

use waypoint_core::{NamingError, Scope, Update, WatchFuture, Watcher};

use crate::resolver::Resolver;

/// Resolver that defers name resolution to the client transport.
#[derive(Debug, Clone, Default)]
pub struct PassthroughResolver {
    scope: Scope,
}

impl PassthroughResolver {
    /// Create a passthrough resolver whose watchers live within `scope`.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }
}

impl Resolver for PassthroughResolver {
    fn resolve(&self, target: &str) -> Result<Box<dyn Watcher>, NamingError> {
        if target.is_empty() {
            return Err(NamingError::MissingAddress);
        }
        Ok(Box::new(OnceWatcher::new(
            &self.scope,
            Update::add(target),
        )))
    }
}

/// Watcher that yields one update and then waits until closed.
///
/// Used wherever the address set is known up front and never changes: the
/// literal passthrough target, or an IP literal handed to the DNS resolver.
#[derive(Debug)]
pub struct OnceWatcher {
    pending: Option<Update>,
    scope: Scope,
}

impl OnceWatcher {
    /// Create a watcher bound to a child of `scope` that reports `update` once.
    #[must_use]
    pub fn new(scope: &Scope, update: Update) -> Self {
        Self {
            pending: Some(update),
            scope: scope.child(),
        }
    }
}

impl Watcher for OnceWatcher {
    fn next(&mut self) -> WatchFuture<'_> {
        Box::pin(async move {
            if self.scope.is_cancelled() {
                return Err(NamingError::WatcherClosed);
            }
            if let Some(update) = self.pending.take() {
                return Ok(vec![update]);
            }
            self.scope.cancelled().await;
            Err(NamingError::WatcherClosed)
        })
    }

    fn close(&self) {
        self.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use waypoint_core::Op;

    #[tokio::test]
    async fn test_passthrough_yields_target_once() {
        let resolver = PassthroughResolver::new(Scope::new());
        let mut watcher = resolver.resolve("payments.internal:8080").unwrap();

        let updates = watcher.next().await.unwrap();
        assert_eq!(updates, vec![Update::add("payments.internal:8080")]);
        assert_eq!(updates[0].op, Op::Add);

        let blocked = tokio::time::timeout(Duration::from_millis(50), watcher.next()).await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_passthrough_rejects_empty_target() {
        let resolver = PassthroughResolver::default();
        assert_eq!(
            resolver.resolve("").err(),
            Some(NamingError::MissingAddress)
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let resolver = PassthroughResolver::new(Scope::new());
        let mut watcher = resolver.resolve("payments:8080").unwrap();
        watcher.next().await.unwrap();

        watcher.close();
        watcher.close();

        assert_eq!(watcher.next().await, Err(NamingError::WatcherClosed));
        assert_eq!(watcher.next().await, Err(NamingError::WatcherClosed));
    }

    #[tokio::test]
    async fn test_close_before_first_next() {
        let resolver = PassthroughResolver::new(Scope::new());
        let mut watcher = resolver.resolve("payments:8080").unwrap();
        watcher.close();

        assert_eq!(watcher.next().await, Err(NamingError::WatcherClosed));
    }

    #[tokio::test]
    async fn test_scope_cancel_unblocks_next() {
        let scope = Scope::new();
        let resolver = PassthroughResolver::new(scope.clone());
        let mut watcher = resolver.resolve("payments:8080").unwrap();
        watcher.next().await.unwrap();

        let pending = tokio::spawn(async move { watcher.next().await });
        tokio::task::yield_now().await;
        scope.cancel();

        assert_eq!(pending.await.unwrap(), Err(NamingError::WatcherClosed));
    }
}
