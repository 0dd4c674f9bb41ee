//! DNS-based name resolution.
//!
//! A [`DnsWatcher`] polls the name servers on a fixed interval. Each poll
//! first looks for SRV records (`_spine._tcp.<host>` by default) and
//! resolves their targets. Only when the SRV query fails or returns no
//! records does it fall back to the A/AAAA records of the host itself,
//! paired with the target port.

use std::collections::BTreeSet;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::Resolver as HickoryResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use tokio::time::Instant;
use waypoint_core::{NamingError, Scope, Update, WatchFuture, Watcher};

use crate::config::DnsConfig;
use crate::passthrough::OnceWatcher;
use crate::resolver::Resolver;
use crate::target::{Target, parse_target};

/// Type alias for the Tokio-based hickory resolver.
type TokioResolver = HickoryResolver<TokioConnectionProvider>;

/// One SRV record: a host name and the port the service listens on there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvTarget {
    /// Host name the record points to.
    pub target: String,
    /// Service port on that host.
    pub port: u16,
}

/// Trait for the DNS queries a watcher issues.
pub trait Lookup: Send + Sync + 'static {
    /// Look up the SRV records of `_<service>._<proto>.<name>`.
    fn lookup_srv(
        &self,
        service: &str,
        proto: &str,
        name: &str,
    ) -> impl Future<Output = Result<Vec<SrvTarget>, NamingError>> + Send;

    /// Look up the A/AAAA records of `host`.
    fn lookup_host(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<Vec<IpAddr>, NamingError>> + Send;
}

/// [`Lookup`] backed by the hickory resolver.
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    /// Create a lookup using the system resolver configuration, falling back
    /// to hickory's defaults when it cannot be read.
    #[must_use]
    pub fn new() -> Self {
        match hickory_resolver::system_conf::read_system_conf() {
            Ok((config, opts)) => Self::with_config(config, opts),
            Err(e) => {
                tracing::warn!(
                    tag = "naming.dns.conf.fail",
                    error = %e,
                    "Failed reading system resolver configuration, using defaults"
                );
                Self::with_config(ResolverConfig::default(), ResolverOpts::default())
            }
        }
    }

    /// Create a lookup with custom configuration.
    #[must_use]
    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        let resolver =
            HickoryResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self { resolver }
    }
}

impl Default for HickoryLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl Lookup for HickoryLookup {
    async fn lookup_srv(
        &self,
        service: &str,
        proto: &str,
        name: &str,
    ) -> Result<Vec<SrvTarget>, NamingError> {
        let query = format!("_{service}._{proto}.{name}");
        let lookup = self
            .resolver
            .srv_lookup(query.as_str())
            .await
            .map_err(|e| NamingError::Lookup(e.to_string()))?;

        Ok(lookup
            .iter()
            .map(|record| SrvTarget {
                target: record.target().to_string(),
                port: record.port(),
            })
            .collect())
    }

    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, NamingError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| NamingError::Lookup(e.to_string()))?;

        Ok(lookup.iter().collect())
    }
}

/// Difference between two polled address sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrDelta {
    /// Addresses present now but not before.
    pub added: Vec<String>,
    /// Addresses present before but not now.
    pub removed: Vec<String>,
}

impl AddrDelta {
    /// Compute the delta from `previous` to `current`. Addresses in both
    /// sets appear in neither list.
    #[must_use]
    pub fn between(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> Self {
        Self {
            added: current.difference(previous).cloned().collect(),
            removed: previous.difference(current).cloned().collect(),
        }
    }

    /// Check whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Deletes first, then adds.
    #[must_use]
    pub fn into_updates(self) -> Vec<Update> {
        self.removed
            .into_iter()
            .map(Update::delete)
            .chain(self.added.into_iter().map(Update::add))
            .collect()
    }
}

/// DNS resolver creating polling watchers.
///
/// IP literals are already resolved: they get a watcher that reports the
/// address once and never polls.
///
/// ## Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use waypoint_core::{Scope, Watcher};
/// use waypoint_naming::{DnsResolver, Resolver};
///
/// # async fn run() -> Result<(), waypoint_core::NamingError> {
/// let resolver = DnsResolver::new(Scope::new()).freq(Duration::from_secs(60));
/// let mut watcher = resolver.resolve("payments.internal:8080")?;
/// let initial = watcher.next().await?;
/// # Ok(())
/// # }
/// ```
pub struct DnsResolver<L = HickoryLookup> {
    scope: Scope,
    config: DnsConfig,
    lookup: Arc<L>,
}

impl DnsResolver {
    /// Create a DNS resolver with system configuration.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self::with_lookup(scope, HickoryLookup::new())
    }
}

impl<L: Lookup> DnsResolver<L> {
    /// Create a resolver issuing its queries through `lookup`.
    #[must_use]
    pub fn with_lookup(scope: Scope, lookup: L) -> Self {
        Self::with_shared_lookup(scope, Arc::new(lookup))
    }

    /// Create a resolver sharing `lookup` with other resolvers.
    #[must_use]
    pub fn with_shared_lookup(scope: Scope, lookup: Arc<L>) -> Self {
        Self {
            scope,
            config: DnsConfig::default(),
            lookup,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: DnsConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the polling interval.
    #[must_use]
    pub fn freq(mut self, freq: Duration) -> Self {
        self.config.freq = freq;
        self
    }
}

impl<L: Lookup> Resolver for DnsResolver<L> {
    fn resolve(&self, target: &str) -> Result<Box<dyn Watcher>, NamingError> {
        let target = parse_target(target, self.config.default_port)?;

        if target.ip().is_some() {
            return Ok(Box::new(OnceWatcher::new(
                &self.scope,
                Update::add(target.addr()),
            )));
        }

        Ok(Box::new(DnsWatcher {
            target,
            config: self.config.clone(),
            lookup: Arc::clone(&self.lookup),
            scope: self.scope.child(),
            current: BTreeSet::new(),
            next_poll: Instant::now(),
        }))
    }
}

/// Watches the name resolution of one DNS target.
///
/// The first poll happens as soon as `next` is called; every later poll
/// waits the full interval. Lookup failures are logged and count as an
/// empty result.
pub struct DnsWatcher<L> {
    target: Target,
    config: DnsConfig,
    lookup: Arc<L>,
    scope: Scope,
    /// Address set of the latest poll.
    current: BTreeSet<String>,
    next_poll: Instant,
}

impl<L: Lookup> DnsWatcher<L> {
    /// Addresses derived from the SRV records of the host.
    ///
    /// `None` when the SRV query fails or returns no records. Records whose
    /// targets cannot be resolved still count as an answer and yield an
    /// empty set.
    async fn lookup_srv(&self) -> Option<BTreeSet<String>> {
        let records = match self
            .lookup
            .lookup_srv(
                &self.config.srv_service,
                &self.config.srv_proto,
                &self.target.host,
            )
            .await
        {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => return None,
            Err(e) => {
                tracing::trace!(
                    tag = "naming.dns.srv.fail",
                    scope = self.scope.id,
                    host = %self.target.host,
                    error = %e,
                    "Failed dns SRV record lookup"
                );
                return None;
            }
        };

        let mut addrs = BTreeSet::new();
        for record in records {
            match self.lookup.lookup_host(&record.target).await {
                Ok(ips) => addrs.extend(
                    ips.into_iter()
                        .map(|ip| SocketAddr::new(ip, record.port).to_string()),
                ),
                Err(e) => {
                    tracing::warn!(
                        tag = "naming.dns.srv.fail",
                        scope = self.scope.id,
                        target = %record.target,
                        error = %e,
                        "Failed load balancer address dns lookup"
                    );
                }
            }
        }

        Some(addrs)
    }

    /// Addresses derived from the A/AAAA records of the host.
    async fn lookup_host(&self) -> BTreeSet<String> {
        match self.lookup.lookup_host(&self.target.host).await {
            Ok(ips) => ips
                .into_iter()
                .map(|ip| SocketAddr::new(ip, self.target.port).to_string())
                .collect(),
            Err(e) => {
                tracing::trace!(
                    tag = "naming.dns.a.fail",
                    scope = self.scope.id,
                    host = %self.target.host,
                    error = %e,
                    "Failed dns A record lookup"
                );
                BTreeSet::new()
            }
        }
    }

    async fn candidates(&self) -> BTreeSet<String> {
        match self.lookup_srv().await {
            Some(addrs) => addrs,
            None => self.lookup_host().await,
        }
    }
}

impl<L: Lookup> Watcher for DnsWatcher<L> {
    fn next(&mut self) -> WatchFuture<'_> {
        Box::pin(async move {
            loop {
                if self.scope.is_cancelled() {
                    return Err(NamingError::WatcherClosed);
                }

                tokio::select! {
                    biased;
                    () = self.scope.cancelled() => return Err(NamingError::WatcherClosed),
                    () = tokio::time::sleep_until(self.next_poll) => {}
                }

                let addrs = tokio::select! {
                    biased;
                    () = self.scope.cancelled() => return Err(NamingError::WatcherClosed),
                    addrs = self.candidates() => addrs,
                };

                let delta = AddrDelta::between(&self.current, &addrs);
                self.current = addrs;
                self.next_poll = Instant::now() + self.config.freq;

                if !delta.is_empty() {
                    tracing::trace!(
                        tag = "naming.dns.update",
                        scope = self.scope.id,
                        host = %self.target.host,
                        added = delta.added.len(),
                        removed = delta.removed.len(),
                        "Address set changed"
                    );
                    return Ok(delta.into_updates());
                }
            }
        })
    }

    fn close(&self) {
        self.scope.cancel();
    }
}
