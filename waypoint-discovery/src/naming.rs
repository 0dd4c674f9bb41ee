//! Endpoint resolution driven by naming watchers.
//!
//! A naming watcher announces address strings. Transports need socket
//! addresses, so every announcement is converted into a [`Change`] and
//! folded into an [`EndpointSet`] that always holds the full current list.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use waypoint_core::{Op, Scope, Update, Watcher};
use waypoint_naming::Registry;

use crate::resolver::{Endpoint, EndpointResolver, ResolveError};

/// A single change to the endpoint set, keyed by the announced address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The address became available and maps to these endpoints.
    Insert {
        key: String,
        endpoints: Vec<Endpoint>,
    },
    /// The address is gone.
    Remove { key: String },
}

impl Change {
    /// Convert an address update.
    ///
    /// Addresses that are not socket address literals are looked up with the
    /// system resolver; a hostname may expand to several endpoints.
    pub async fn from_update(update: Update) -> Result<Self, ResolveError> {
        let Update { op, addr, metadata } = update;

        if op == Op::Delete {
            return Ok(Self::Remove { key: addr });
        }

        let addrs: Vec<SocketAddr> = match addr.parse::<SocketAddr>() {
            Ok(socket) => vec![socket],
            Err(_) => tokio::net::lookup_host(addr.as_str())
                .await
                .map_err(|e| {
                    tracing::trace!(tag = "discovery.lookup.fail", addr = %addr, error = %e);
                    ResolveError::InvalidAddress(addr.clone())
                })?
                .collect(),
        };

        if addrs.is_empty() {
            return Err(ResolveError::InvalidAddress(addr));
        }

        let endpoints = addrs
            .into_iter()
            .map(|socket| match &metadata {
                Some(metadata) => Endpoint::new(socket).with_metadata(metadata.clone()),
                None => Endpoint::new(socket),
            })
            .collect();

        Ok(Self::Insert {
            key: addr,
            endpoints,
        })
    }
}

/// Current endpoints, grouped by the address that announced them.
#[derive(Debug, Clone, Default)]
pub struct EndpointSet {
    entries: BTreeMap<String, Vec<Endpoint>>,
}

impl EndpointSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a change. Inserting an existing key replaces its endpoints.
    pub fn apply(&mut self, change: Change) {
        match change {
            Change::Insert { key, endpoints } => {
                self.entries.insert(key, endpoints);
            }
            Change::Remove { key } => {
                self.entries.remove(&key);
            }
        }
    }

    /// Flattened endpoint list, ordered by announced address.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.entries.values().flatten().cloned().collect()
    }

    /// Number of announced addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no address is currently announced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// [`EndpointResolver`] backed by a naming [`Registry`].
///
/// Service names are naming targets such as `dns:///payments.internal` or
/// `disco://payments?tag=eu`.
#[derive(Debug, Clone)]
pub struct NamingResolver {
    registry: Arc<Registry>,
    scope: Scope,
}

impl NamingResolver {
    /// Create a resolver over `registry`. Cancelling `scope` ends all watches.
    #[must_use]
    pub fn new(registry: Arc<Registry>, scope: Scope) -> Self {
        Self { registry, scope }
    }

    /// The registry used for dispatch.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl EndpointResolver for NamingResolver {
    async fn resolve(&self, service: &str) -> Result<Vec<Endpoint>, ResolveError> {
        let mut watcher = self.registry.resolve(&self.scope, service)?;
        let first = watcher.next().await;
        watcher.close();

        let mut set = EndpointSet::new();
        for update in first? {
            set.apply(Change::from_update(update).await?);
        }

        if set.is_empty() {
            return Err(ResolveError::NoEndpoints(service.to_string()));
        }
        Ok(set.endpoints())
    }

    fn watch(&self, service: &str) -> impl Stream<Item = Vec<Endpoint>> + Send + Unpin {
        let (tx, rx) = watch::channel(Vec::new());

        match self.registry.resolve(&self.scope, service) {
            Ok(watcher) => {
                tokio::spawn(drive(watcher, tx, service.to_string()));
            }
            // Dropping the sender ends the stream.
            Err(e) => {
                tracing::warn!(tag = "discovery.watch.fail", service = %service, error = %e);
            }
        }

        WatchStream::from_changes(rx)
    }
}

/// Pump `watcher` into `tx` until either side goes away.
async fn drive(mut watcher: Box<dyn Watcher>, tx: watch::Sender<Vec<Endpoint>>, service: String) {
    let mut set = EndpointSet::new();

    loop {
        let updates = tokio::select! {
            () = tx.closed() => break,
            result = watcher.next() => match result {
                Ok(updates) => updates,
                Err(e) => {
                    if !e.is_closed() {
                        tracing::warn!(tag = "discovery.watch.fail", service = %service, error = %e);
                    }
                    break;
                }
            },
        };

        for update in updates {
            match Change::from_update(update).await {
                Ok(change) => set.apply(change),
                Err(e) => {
                    tracing::warn!(tag = "discovery.watch.skip", service = %service, error = %e);
                }
            }
        }

        tracing::debug!(
            tag = "discovery.watch.update",
            service = %service,
            endpoints = set.len(),
        );
        if tx.send(set.endpoints()).is_err() {
            break;
        }
    }

    watcher.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use waypoint_core::NamingError;
    use waypoint_disco::{Agent, LocalAgent, Registration};
    use waypoint_naming::NamingConfig;

    fn registry(agent: &LocalAgent) -> Arc<Registry> {
        let agent: Arc<dyn Agent> = Arc::new(agent.clone());
        Arc::new(Registry::with_defaults(agent, &NamingConfig::default()))
    }

    fn addrs(endpoints: &[Endpoint]) -> Vec<String> {
        endpoints.iter().map(|e| e.addr.to_string()).collect()
    }

    #[tokio::test]
    async fn test_change_from_literal() {
        let change = Change::from_update(Update::add("10.0.0.1:8080")).await.unwrap();
        assert_eq!(
            change,
            Change::Insert {
                key: "10.0.0.1:8080".into(),
                endpoints: vec![Endpoint::new("10.0.0.1:8080".parse().unwrap())],
            }
        );

        let change = Change::from_update(Update::delete("10.0.0.1:8080")).await.unwrap();
        assert_eq!(
            change,
            Change::Remove {
                key: "10.0.0.1:8080".into()
            }
        );
    }

    #[tokio::test]
    async fn test_change_carries_metadata() {
        let update = Update::add("10.0.0.1:8080")
            .with_metadata([("weight".to_string(), "7".to_string())].into_iter().collect());

        let Change::Insert { endpoints, .. } = Change::from_update(update).await.unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(endpoints[0].weight, 7);
    }

    #[tokio::test]
    async fn test_change_rejects_garbage() {
        let err = Change::from_update(Update::add("not an address"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidAddress(addr) if addr == "not an address"));
    }

    #[test]
    fn test_endpoint_set_apply() {
        let mut set = EndpointSet::new();
        set.apply(Change::Insert {
            key: "b".into(),
            endpoints: vec![Endpoint::new("10.0.0.2:80".parse().unwrap())],
        });
        set.apply(Change::Insert {
            key: "a".into(),
            endpoints: vec![Endpoint::new("10.0.0.1:80".parse().unwrap())],
        });
        assert_eq!(addrs(&set.endpoints()), ["10.0.0.1:80", "10.0.0.2:80"]);

        set.apply(Change::Remove { key: "a".into() });
        set.apply(Change::Remove { key: "missing".into() });
        assert_eq!(set.len(), 1);
        assert_eq!(addrs(&set.endpoints()), ["10.0.0.2:80"]);
    }

    #[tokio::test]
    async fn test_resolve_passthrough() {
        let resolver = NamingResolver::new(registry(&LocalAgent::new()), Scope::new());
        let endpoints = resolver.resolve("10.0.0.1:9000").await.unwrap();
        assert_eq!(addrs(&endpoints), ["10.0.0.1:9000"]);
    }

    #[tokio::test]
    async fn test_resolve_disco_service() {
        let agent = LocalAgent::new();
        agent
            .register(Registration::new("payments", "10.0.0.1", 8080).id("a"))
            .unwrap();
        agent
            .register(Registration::new("payments", "10.0.0.2", 8080).id("b"))
            .unwrap();

        let resolver = NamingResolver::new(registry(&agent), Scope::new());
        let endpoints = resolver.resolve("disco://payments").await.unwrap();
        assert_eq!(addrs(&endpoints), ["10.0.0.1:8080", "10.0.0.2:8080"]);

        // The one-shot watcher was closed.
        assert_eq!(agent.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_unknown_scheme() {
        let resolver = NamingResolver::new(registry(&LocalAgent::new()), Scope::new());
        let err = resolver.resolve("foo://bar").await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Naming(NamingError::ResolverNotFound(scheme)) if scheme == "foo"
        ));
    }

    #[tokio::test]
    async fn test_watch_follows_membership() {
        let agent = LocalAgent::new();
        agent
            .register(Registration::new("payments", "10.0.0.1", 8080).id("a"))
            .unwrap();

        let resolver = NamingResolver::new(registry(&agent), Scope::new());
        let mut stream = resolver.watch("disco://payments");

        assert_eq!(addrs(&stream.next().await.unwrap()), ["10.0.0.1:8080"]);

        agent
            .register(Registration::new("payments", "10.0.0.2", 8080).id("b"))
            .unwrap();
        let mut endpoints = stream.next().await.unwrap();
        while endpoints.len() != 2 {
            endpoints = stream.next().await.unwrap();
        }
        assert_eq!(addrs(&endpoints), ["10.0.0.1:8080", "10.0.0.2:8080"]);

        agent.deregister("a").unwrap();
        let mut endpoints = stream.next().await.unwrap();
        while endpoints.len() != 1 {
            endpoints = stream.next().await.unwrap();
        }
        assert_eq!(addrs(&endpoints), ["10.0.0.2:8080"]);
    }

    #[tokio::test]
    async fn test_watch_ends_when_scope_cancelled() {
        let agent = LocalAgent::new();
        agent
            .register(Registration::new("payments", "10.0.0.1", 8080))
            .unwrap();

        let scope = Scope::new();
        let resolver = NamingResolver::new(registry(&agent), scope.clone());
        let mut stream = resolver.watch("disco://payments");
        stream.next().await.unwrap();

        scope.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_watch_unknown_scheme_ends_immediately() {
        let resolver = NamingResolver::new(registry(&LocalAgent::new()), Scope::new());
        let mut stream = resolver.watch("foo://bar");
        assert!(stream.next().await.is_none());
    }
}
