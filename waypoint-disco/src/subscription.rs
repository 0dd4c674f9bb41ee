//! Catalogue subscriptions.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use waypoint_core::DiscoError;

use crate::event::Event;
use crate::instance::Instance;

/// Selects which instances a subscription receives events for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Only instances of this service. `None` matches every service.
    pub name: Option<String>,

    /// Only instances carrying all of these tags.
    pub tags: Vec<String>,
}

impl Filter {
    /// Match every instance.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Match instances of `name` carrying all of `tags`.
    #[must_use]
    pub fn service(name: impl Into<String>, tags: &[String]) -> Self {
        Self {
            name: Some(name.into()),
            tags: tags.to_vec(),
        }
    }

    /// Check whether `instance` passes the filter.
    #[must_use]
    pub fn matches(&self, instance: &Instance) -> bool {
        self.name.as_deref().is_none_or(|n| n == instance.name) && instance.has_tags(&self.tags)
    }
}

type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Receiving end of a catalogue subscription.
///
/// Events queue up without bound until drained, so a slow subscriber never
/// stalls the agent. The first call to [`next`](Self::next) returns the
/// catalogue contents at subscription time as `Add` events.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Event>,
    unsubscribe: Mutex<Option<Unsubscribe>>,
    closed: AtomicBool,
}

impl Subscription {
    /// Create a subscription over `rx`. `unsubscribe` runs once, on close or drop.
    pub fn new(
        rx: mpsc::UnboundedReceiver<Event>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            unsubscribe: Mutex::new(Some(Box::new(unsubscribe))),
            closed: AtomicBool::new(false),
        }
    }

    /// Wait for the next batch of events.
    ///
    /// Returns every event queued at wake-up time. Fails with
    /// [`DiscoError::WatcherClosed`] once the subscription is closed or the
    /// agent dropped it.
    pub async fn next(&mut self) -> Result<Vec<Event>, DiscoError> {
        if self.is_closed() {
            return Err(DiscoError::WatcherClosed);
        }

        let first = self.rx.recv().await.ok_or(DiscoError::WatcherClosed)?;
        let mut events = vec![first];
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        Ok(events)
    }

    /// Stop receiving events. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(unsubscribe) = self.unsubscribe.lock().take() {
            unsubscribe();
        }
    }

    /// Check whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn inst(name: &str, tags: &[&str]) -> Instance {
        Instance {
            local: true,
            id: format!("{name}-1"),
            name: name.to_string(),
            host: "10.0.0.1".to_string(),
            port: 80,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_filter_matches() {
        assert!(Filter::all().matches(&inst("payments", &[])));

        let filter = Filter::service("payments", &["eu".to_string()]);
        assert!(filter.matches(&inst("payments", &["eu", "v2"])));
        assert!(!filter.matches(&inst("payments", &["us"])));
        assert!(!filter.matches(&inst("billing", &["eu"])));
    }

    #[tokio::test]
    async fn test_next_batches_queued_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(rx, || {});

        let a = Arc::new(inst("payments", &[]));
        tx.send(Event::add(Arc::clone(&a))).unwrap();
        tx.send(Event::delete(a)).unwrap();

        let events = sub.next().await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(Event::add(Arc::new(inst("payments", &[])))).unwrap();
        sub.close();
        sub.close();

        assert_eq!(sub.next().await, Err(DiscoError::WatcherClosed));
        assert_eq!(sub.next().await, Err(DiscoError::WatcherClosed));
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sender_dropped_closes() {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();
        let mut sub = Subscription::new(rx, || {});
        drop(tx);

        assert_eq!(sub.next().await, Err(DiscoError::WatcherClosed));
    }
}
