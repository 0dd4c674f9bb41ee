//! Discovery-backed name resolution.
//!
//! Bridges the instance events of a discovery [`Agent`] to address updates.

use std::collections::HashMap;
use std::sync::Arc;

use waypoint_core::{NamingError, Scope, Update, WatchFuture, Watcher};
use waypoint_disco::{Agent, Event, EventOp, Filter, Instance, Subscription};

use crate::resolver::Resolver;

/// Resolver using service discovery to find available instances.
///
/// Targets are service names. Only instances carrying every configured tag
/// are reported.
#[derive(Clone)]
pub struct DiscoResolver {
    scope: Scope,
    agent: Arc<dyn Agent>,
    tags: Vec<String>,
}

impl DiscoResolver {
    /// Create a resolver querying `agent`.
    #[must_use]
    pub fn new(scope: Scope, agent: Arc<dyn Agent>) -> Self {
        Self {
            scope,
            agent,
            tags: Vec::new(),
        }
    }

    /// Restrict resolution to instances carrying all of `tags`.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl Resolver for DiscoResolver {
    fn resolve(&self, target: &str) -> Result<Box<dyn Watcher>, NamingError> {
        if target.is_empty() {
            return Err(NamingError::MissingAddress);
        }
        // Subscribe before checking membership: an instance leaving in between
        // fails the check instead of leaving the watcher with an empty seed.
        let subscription = self.agent.watch(Filter::service(target, &self.tags));
        self.agent.service(target, &self.tags)?;
        Ok(Box::new(DiscoWatcher::new(&self.scope, subscription)))
    }
}

/// Watcher translating discovery events into address updates.
#[derive(Debug)]
pub struct DiscoWatcher {
    subscription: Subscription,
    /// Last known instance per ID.
    instances: HashMap<String, Arc<Instance>>,
    scope: Scope,
}

impl DiscoWatcher {
    /// Wrap `subscription`, bound to a child of `scope`.
    #[must_use]
    pub fn new(scope: &Scope, subscription: Subscription) -> Self {
        Self {
            subscription,
            instances: HashMap::new(),
            scope: scope.child(),
        }
    }

    /// Translate one batch of events, updating the instance cache.
    ///
    /// An update that keeps the address produces nothing; one that moves it
    /// produces a delete of the old address immediately followed by an add
    /// of the new one. An update for an ID this watcher never saw is
    /// announced as an add rather than dropped, since the address is live
    /// and consumers would otherwise never learn about it.
    fn translate(&mut self, events: Vec<Event>) -> Vec<Update> {
        let mut updates = Vec::with_capacity(events.len());

        for event in events {
            let id = event.instance.id.clone();
            match event.op {
                EventOp::Add => {
                    updates.push(Update::add(event.instance.addr()));
                    self.instances.insert(id, event.instance);
                }
                EventOp::Update => match self.instances.insert(id, Arc::clone(&event.instance)) {
                    Some(previous) => {
                        let (old, new) = (previous.addr(), event.instance.addr());
                        if old != new {
                            updates.push(Update::delete(old));
                            updates.push(Update::add(new));
                        }
                    }
                    // Never announced, so there is nothing to replace.
                    None => updates.push(Update::add(event.instance.addr())),
                },
                EventOp::Delete => {
                    let addr = self
                        .instances
                        .remove(&id)
                        .map_or_else(|| event.instance.addr(), |known| known.addr());
                    updates.push(Update::delete(addr));
                }
            }
        }

        updates
    }
}

impl Watcher for DiscoWatcher {
    fn next(&mut self) -> WatchFuture<'_> {
        Box::pin(async move {
            loop {
                if self.scope.is_cancelled() {
                    self.subscription.close();
                    return Err(NamingError::WatcherClosed);
                }

                let events = tokio::select! {
                    biased;
                    () = self.scope.cancelled() => {
                        self.subscription.close();
                        return Err(NamingError::WatcherClosed);
                    }
                    events = self.subscription.next() => events?,
                };

                let updates = self.translate(events);
                if !updates.is_empty() {
                    return Ok(updates);
                }
            }
        })
    }

    fn close(&self) {
        self.scope.cancel();
        self.subscription.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use waypoint_core::DiscoError;
    use waypoint_disco::{LocalAgent, Registration, Service};

    /// Agent whose last instance leaves right before a subscription is taken.
    struct DepartingAgent {
        inner: LocalAgent,
        departing: String,
    }

    impl Agent for DepartingAgent {
        fn register(&self, registration: Registration) -> Result<String, DiscoError> {
            self.inner.register(registration)
        }

        fn deregister(&self, id: &str) -> Result<(), DiscoError> {
            self.inner.deregister(id)
        }

        fn services(&self, tags: &[String]) -> HashMap<String, Service> {
            self.inner.services(tags)
        }

        fn service(&self, name: &str, tags: &[String]) -> Result<Service, DiscoError> {
            self.inner.service(name, tags)
        }

        fn watch(&self, filter: Filter) -> Subscription {
            self.inner.deregister(&self.departing).unwrap();
            self.inner.watch(filter)
        }

        fn leave(&self) {
            self.inner.leave();
        }
    }

    fn instance(id: &str, host: &str, port: u16) -> Arc<Instance> {
        Arc::new(Instance {
            local: false,
            id: id.to_string(),
            name: "payments".to_string(),
            host: host.to_string(),
            port,
            tags: Vec::new(),
        })
    }

    fn detached_watcher() -> DiscoWatcher {
        let agent = LocalAgent::new();
        DiscoWatcher::new(&Scope::new(), agent.watch(Filter::all()))
    }

    #[test]
    fn test_translate_add_and_delete() {
        let mut watcher = detached_watcher();

        let updates = watcher.translate(vec![Event::add(instance("a", "10.0.0.1", 80))]);
        assert_eq!(updates, vec![Update::add("10.0.0.1:80")]);

        let updates = watcher.translate(vec![Event::delete(instance("a", "10.0.0.1", 80))]);
        assert_eq!(updates, vec![Update::delete("10.0.0.1:80")]);
        assert!(watcher.instances.is_empty());
    }

    #[test]
    fn test_translate_unchanged_update_is_suppressed() {
        let mut watcher = detached_watcher();
        watcher.translate(vec![Event::add(instance("a", "10.0.0.1", 80))]);

        let updates = watcher.translate(vec![Event::update(instance("a", "10.0.0.1", 80))]);
        assert!(updates.is_empty());
    }

    #[test]
    fn test_translate_moved_instance() {
        let mut watcher = detached_watcher();
        watcher.translate(vec![Event::add(instance("a", "10.0.0.1", 80))]);

        let updates = watcher.translate(vec![Event::update(instance("a", "10.0.0.2", 80))]);
        assert_eq!(
            updates,
            vec![Update::delete("10.0.0.1:80"), Update::add("10.0.0.2:80")]
        );

        // The cache follows the move.
        let updates = watcher.translate(vec![Event::delete(instance("a", "10.0.0.2", 80))]);
        assert_eq!(updates, vec![Update::delete("10.0.0.2:80")]);
    }

    #[test]
    fn test_translate_update_for_unseen_id_adds() {
        let mut watcher = detached_watcher();

        let updates = watcher.translate(vec![Event::update(instance("a", "10.0.0.1", 80))]);
        assert_eq!(updates, vec![Update::add("10.0.0.1:80")]);
        assert!(watcher.instances.contains_key("a"));
    }

    #[test]
    fn test_delete_uses_last_known_address() {
        let mut watcher = detached_watcher();
        watcher.translate(vec![Event::add(instance("a", "10.0.0.1", 80))]);

        let updates = watcher.translate(vec![Event::delete(instance("a", "10.9.9.9", 80))]);
        assert_eq!(updates, vec![Update::delete("10.0.0.1:80")]);
    }

    #[tokio::test]
    async fn test_resolve_registered_service() {
        let agent = LocalAgent::new();
        agent
            .register(Registration::new("payments", "10.0.0.1", 8080).id("a"))
            .unwrap();

        let resolver = DiscoResolver::new(Scope::new(), Arc::new(agent.clone()));
        let mut watcher = resolver.resolve("payments").unwrap();
        assert_eq!(
            watcher.next().await.unwrap(),
            vec![Update::add("10.0.0.1:8080")]
        );

        agent
            .register(Registration::new("payments", "10.0.0.2", 8080).id("b"))
            .unwrap();
        agent.deregister("a").unwrap();

        let mut updates = watcher.next().await.unwrap();
        if updates.len() == 1 {
            updates.extend(watcher.next().await.unwrap());
        }
        assert_eq!(
            updates,
            vec![Update::add("10.0.0.2:8080"), Update::delete("10.0.0.1:8080")]
        );
    }

    #[tokio::test]
    async fn test_resolve_filters_tags() {
        let agent = LocalAgent::new();
        agent
            .register(Registration::new("payments", "10.0.0.1", 8080).tag("eu"))
            .unwrap();
        agent
            .register(Registration::new("payments", "10.0.0.2", 8080).tag("us"))
            .unwrap();

        let resolver = DiscoResolver::new(Scope::new(), Arc::new(agent)).tags(["eu"]);
        let mut watcher = resolver.resolve("payments").unwrap();
        assert_eq!(
            watcher.next().await.unwrap(),
            vec![Update::add("10.0.0.1:8080")]
        );
    }

    #[test]
    fn test_resolve_unknown_service() {
        let resolver = DiscoResolver::new(Scope::new(), Arc::new(LocalAgent::new()));
        assert!(matches!(
            resolver.resolve("payments").err(),
            Some(NamingError::Disco(_))
        ));
    }

    #[test]
    fn test_instance_leaving_during_resolve() {
        let inner = LocalAgent::new();
        inner
            .register(Registration::new("payments", "10.0.0.1", 8080).id("a"))
            .unwrap();
        let agent = DepartingAgent {
            inner: inner.clone(),
            departing: "a".to_string(),
        };

        let resolver = DiscoResolver::new(Scope::new(), Arc::new(agent));
        assert_eq!(
            resolver.resolve("payments").err(),
            Some(NamingError::Disco(DiscoError::ServiceNotFound(
                "payments".into()
            )))
        );
        assert_eq!(inner.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let agent = LocalAgent::new();
        agent
            .register(Registration::new("payments", "10.0.0.1", 8080))
            .unwrap();
        let resolver = DiscoResolver::new(Scope::new(), Arc::new(agent.clone()));
        let mut watcher = resolver.resolve("payments").unwrap();
        assert_eq!(agent.subscriber_count(), 1);

        watcher.close();
        watcher.close();
        assert_eq!(agent.subscriber_count(), 0);
        assert_eq!(watcher.next().await, Err(NamingError::WatcherClosed));
    }

    #[tokio::test]
    async fn test_agent_leave_closes_watcher() {
        let agent = LocalAgent::new();
        agent
            .register(Registration::new("payments", "10.0.0.1", 8080))
            .unwrap();
        let resolver = DiscoResolver::new(Scope::new(), Arc::new(agent.clone()));
        let mut watcher = resolver.resolve("payments").unwrap();
        watcher.next().await.unwrap();

        agent.leave();
        assert_eq!(
            watcher.next().await.unwrap(),
            vec![Update::delete("10.0.0.1:8080")]
        );
        assert_eq!(watcher.next().await, Err(NamingError::WatcherClosed));
    }
}
