//! Discovery agents.
//!
//! An [`Agent`] manages the services offered by the local node and answers
//! queries about the catalogue. [`LocalAgent`] keeps everything in process
//! memory and is used when no discovery cluster is configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use waypoint_core::DiscoError;

use crate::event::Event;
use crate::instance::{Instance, Registration};
use crate::subscription::{Filter, Subscription};

/// Trait for service discovery agents.
pub trait Agent: Send + Sync + 'static {
    /// Add an instance to the catalogue and return its ID.
    fn register(&self, registration: Registration) -> Result<String, DiscoError>;

    /// Remove an instance from the catalogue.
    /// If the instance does not exist, no action is taken.
    fn deregister(&self, id: &str) -> Result<(), DiscoError>;

    /// All services having at least one instance carrying `tags`.
    fn services(&self, tags: &[String]) -> HashMap<String, Service>;

    /// The instances of `name` carrying `tags`.
    fn service(&self, name: &str, tags: &[String]) -> Result<Service, DiscoError>;

    /// Subscribe to catalogue changes selected by `filter`.
    ///
    /// The subscription starts with the matching instances as `Add` events.
    fn watch(&self, filter: Filter) -> Subscription;

    /// Deregister every instance owned by this node and drop all
    /// subscriptions.
    fn leave(&self);
}

/// A set of instances offering the same functionality.
#[derive(Clone)]
pub struct Service {
    name: String,
    tags: Vec<String>,
    instances: Vec<Arc<Instance>>,
    agent: Arc<dyn Agent>,
}

impl Service {
    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instances available when the service was queried.
    #[must_use]
    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    /// Listen to changes of this service's instances.
    #[must_use]
    pub fn watch(&self) -> Subscription {
        self.agent.watch(Filter::service(&self.name, &self.tags))
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}

struct Subscriber {
    filter: Filter,
    tx: mpsc::UnboundedSender<Event>,
}

#[derive(Default)]
struct Catalogue {
    registry: HashMap<String, Arc<Instance>>,
    subs: HashMap<u64, Subscriber>,
}

impl Catalogue {
    /// Queue `event` for every interested subscriber and forget the ones
    /// whose receiver is gone. Never blocks.
    fn broadcast(&mut self, event: &Event) {
        self.subs.retain(|_, sub| {
            !sub.filter.matches(&event.instance) || sub.tx.send(event.clone()).is_ok()
        });
    }

    fn deregister(&mut self, id: &str) -> Option<Arc<Instance>> {
        let instance = self.registry.remove(id)?;
        self.broadcast(&Event::delete(Arc::clone(&instance)));
        Some(instance)
    }
}

#[derive(Default)]
struct Inner {
    catalogue: RwLock<Catalogue>,
    next_sub_id: AtomicU64,
}

/// In-memory, local-only discovery agent.
///
/// Cloning is cheap; clones share the same catalogue.
///
/// ## Example
///
/// ```rust
/// use waypoint_disco::{Agent, LocalAgent, Registration};
///
/// let agent = LocalAgent::new();
/// let id = agent
///     .register(Registration::new("payments", "10.0.0.1", 8080).tag("eu"))
///     .unwrap();
///
/// let service = agent.service("payments", &["eu".to_string()]).unwrap();
/// assert_eq!(service.instances()[0].id, id);
/// ```
#[derive(Clone, Default)]
pub struct LocalAgent {
    inner: Arc<Inner>,
}

impl LocalAgent {
    /// Create an agent with an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.catalogue.read().registry.len()
    }

    /// Check if the catalogue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.catalogue.read().registry.is_empty()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.catalogue.read().subs.len()
    }

    fn collect_services(&self, tags: &[String]) -> HashMap<String, Service> {
        let catalogue = self.inner.catalogue.read();
        let agent: Arc<dyn Agent> = Arc::new(self.clone());

        let mut services: HashMap<String, Service> = HashMap::new();
        for instance in catalogue.registry.values().filter(|i| i.has_tags(tags)) {
            services
                .entry(instance.name.clone())
                .or_insert_with(|| Service {
                    name: instance.name.clone(),
                    tags: tags.to_vec(),
                    instances: Vec::new(),
                    agent: Arc::clone(&agent),
                })
                .instances
                .push(Arc::clone(instance));
        }
        for service in services.values_mut() {
            service.instances.sort_by(|a, b| a.id.cmp(&b.id));
        }
        services
    }
}

impl Agent for LocalAgent {
    fn register(&self, registration: Registration) -> Result<String, DiscoError> {
        if registration.name.is_empty() {
            return Err(DiscoError::InvalidRegistration(
                "service name is empty".to_string(),
            ));
        }

        let id = registration
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut catalogue = self.inner.catalogue.write();
        if catalogue.registry.contains_key(&id) {
            return Err(DiscoError::AlreadyRegistered(id));
        }

        let instance = Arc::new(Instance {
            local: true,
            id: id.clone(),
            name: registration.name,
            host: registration.host,
            port: registration.port,
            tags: registration.tags,
        });
        catalogue.registry.insert(id.clone(), Arc::clone(&instance));
        catalogue.broadcast(&Event::add(Arc::clone(&instance)));

        tracing::debug!(
            tag = "disco.register",
            service = %instance.name,
            instance = %id,
            addr = %instance.addr(),
            "Registered service instance"
        );

        Ok(id)
    }

    fn deregister(&self, id: &str) -> Result<(), DiscoError> {
        let removed = self.inner.catalogue.write().deregister(id);
        if let Some(instance) = removed {
            tracing::debug!(
                tag = "disco.deregister",
                service = %instance.name,
                instance = id,
                "Deregistered service instance"
            );
        }
        Ok(())
    }

    fn services(&self, tags: &[String]) -> HashMap<String, Service> {
        self.collect_services(tags)
    }

    fn service(&self, name: &str, tags: &[String]) -> Result<Service, DiscoError> {
        self.collect_services(tags)
            .remove(name)
            .ok_or_else(|| DiscoError::ServiceNotFound(name.to_string()))
    }

    fn watch(&self, filter: Filter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut catalogue = self.inner.catalogue.write();

            let mut current: Vec<&Arc<Instance>> = catalogue
                .registry
                .values()
                .filter(|i| filter.matches(i))
                .collect();
            current.sort_by(|a, b| a.id.cmp(&b.id));
            for instance in current {
                // The receiver is alive until this function returns.
                let _ = tx.send(Event::add(Arc::clone(instance)));
            }

            catalogue.subs.insert(id, Subscriber { filter, tx });
        }

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(rx, move || {
            if let Some(inner) = inner.upgrade() {
                inner.catalogue.write().subs.remove(&id);
            }
        })
    }

    fn leave(&self) {
        let mut catalogue = self.inner.catalogue.write();

        let ids: Vec<String> = catalogue.registry.keys().cloned().collect();
        let count = ids.len();
        for id in ids {
            catalogue.deregister(&id);
        }
        // Dropping the senders ends every subscription once its queued
        // deletes are drained.
        catalogue.subs.clear();

        tracing::debug!(
            tag = "disco.leave",
            instances = count,
            "Left service discovery"
        );
    }
}
