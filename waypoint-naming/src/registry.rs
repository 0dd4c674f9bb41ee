//! Scheme registry.
//!
//! A [`Registry`] maps URI schemes to watcher builders. It is built once at
//! process start and shared by reference with every component that needs
//! name resolution.

use std::borrow::Cow;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use url::Url;
use waypoint_core::{NamingError, Scope, Update, Watcher};
use waypoint_disco::Agent;

use crate::config::{DnsConfig, NamingConfig};
use crate::disco::DiscoResolver;
use crate::dns::{DnsResolver, HickoryLookup, Lookup};
use crate::passthrough::OnceWatcher;
use crate::resolver::Resolver;

/// Builds a watcher from a parsed URI.
///
/// Implemented for every `Fn(&Scope, &Url) -> Result<Box<dyn Watcher>, NamingError>`.
pub trait Builder: Send + Sync {
    /// Build a watcher for `uri`, bound to `scope`.
    fn build(&self, scope: &Scope, uri: &Url) -> Result<Box<dyn Watcher>, NamingError>;
}

impl<F> Builder for F
where
    F: Fn(&Scope, &Url) -> Result<Box<dyn Watcher>, NamingError> + Send + Sync,
{
    fn build(&self, scope: &Scope, uri: &Url) -> Result<Box<dyn Watcher>, NamingError> {
        self(scope, uri)
    }
}

/// Table of watcher builders keyed by URI scheme.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use waypoint_core::{Scope, Watcher};
/// use waypoint_disco::LocalAgent;
/// use waypoint_naming::{NamingConfig, Registry};
///
/// # async fn run() -> Result<(), waypoint_core::NamingError> {
/// let registry = Registry::with_defaults(Arc::new(LocalAgent::new()), &NamingConfig::default());
///
/// // No scheme: the default scheme (`passthrough`) applies.
/// let mut watcher = registry.resolve(&Scope::new(), "payments.internal:8080")?;
/// let updates = watcher.next().await?;
/// assert_eq!(updates[0].addr, "payments.internal:8080");
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    builders: DashMap<String, Arc<dyn Builder>>,
    default_scheme: RwLock<String>,
}

impl Registry {
    /// Create an empty registry with `passthrough` as default scheme.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builders: DashMap::new(),
            default_scheme: RwLock::new(NamingConfig::default().default_scheme),
        }
    }

    /// Create a registry with the `dns`, `disco` and `passthrough` schemes.
    #[must_use]
    pub fn with_defaults(agent: Arc<dyn Agent>, config: &NamingConfig) -> Self {
        let registry = Self::new();
        registry.set_default_scheme(config.default_scheme.clone());
        registry.register_dns(Arc::new(HickoryLookup::new()), config.dns.clone());
        registry.register_disco(agent);
        registry.register("passthrough", build_passthrough);
        registry
    }

    /// Make a builder available for `scheme`.
    ///
    /// # Panics
    ///
    /// Panics if `scheme` is already registered. Registration happens at
    /// startup and a duplicate is a programming error.
    pub fn register(&self, scheme: impl Into<String>, builder: impl Builder + 'static) {
        match self.builders.entry(scheme.into()) {
            Entry::Occupied(entry) => {
                let scheme = entry.key().clone();
                drop(entry);
                panic!("naming: duplicated resolver for scheme {scheme:?}");
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(builder));
            }
        }
    }

    /// Register the `dns` scheme, issuing queries through `lookup`.
    ///
    /// Accepts `dns:///host:port` and `dns://host:port`, with an optional
    /// `freq=<seconds>` query parameter overriding `config.freq`.
    ///
    /// # Panics
    ///
    /// Panics if `dns` is already registered.
    pub fn register_dns<L: Lookup>(&self, lookup: Arc<L>, config: DnsConfig) {
        self.register("dns", move |scope: &Scope, uri: &Url| {
            build_dns(scope, uri, Arc::clone(&lookup), config.clone())
        });
    }

    /// Register the `disco` scheme, backed by `agent`.
    ///
    /// Accepts `disco://service`, with optional repeated `tag=<value>`
    /// query parameters.
    ///
    /// # Panics
    ///
    /// Panics if `disco` is already registered.
    pub fn register_disco(&self, agent: Arc<dyn Agent>) {
        self.register("disco", move |scope: &Scope, uri: &Url| {
            build_disco(scope, uri, Arc::clone(&agent))
        });
    }

    /// Set the scheme applied to names without one.
    pub fn set_default_scheme(&self, scheme: impl Into<String>) {
        *self.default_scheme.write() = scheme.into();
    }

    /// The scheme applied to names without one.
    #[must_use]
    pub fn default_scheme(&self) -> String {
        self.default_scheme.read().clone()
    }

    /// All registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.builders.iter().map(|e| e.key().clone()).collect();
        schemes.sort();
        schemes
    }

    /// Build a watcher for `uri`.
    ///
    /// A fully qualified name uses the syntax `scheme://authority/endpoint`.
    /// Names without `://` are prefixed with the default scheme.
    pub fn resolve(&self, scope: &Scope, uri: &str) -> Result<Box<dyn Watcher>, NamingError> {
        let url = self.parse(uri)?;

        // Cloned out so the builder runs without holding a map shard.
        let builder = self
            .builders
            .get(url.scheme())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| NamingError::ResolverNotFound(url.scheme().to_string()))?;

        builder.build(scope, &url)
    }

    fn parse(&self, uri: &str) -> Result<Url, NamingError> {
        let qualified = if uri.contains("://") {
            Cow::Borrowed(uri)
        } else {
            Cow::Owned(format!("{}://{uri}", self.default_scheme()))
        };
        Url::parse(&qualified).map_err(|e| NamingError::invalid_uri(uri, e))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.schemes())
            .field("default_scheme", &self.default_scheme())
            .finish()
    }
}

/// Everything after `scheme://`.
fn authority_and_path(uri: &Url) -> &str {
    uri.as_str()
        .get(uri.scheme().len() + 3..)
        .unwrap_or_default()
}

pub(crate) fn build_passthrough(
    scope: &Scope,
    uri: &Url,
) -> Result<Box<dyn Watcher>, NamingError> {
    let target = authority_and_path(uri);
    if target.is_empty() {
        return Err(NamingError::MissingAddress);
    }
    Ok(Box::new(OnceWatcher::new(scope, Update::add(target))))
}

fn build_dns<L: Lookup>(
    scope: &Scope,
    uri: &Url,
    lookup: Arc<L>,
    mut config: DnsConfig,
) -> Result<Box<dyn Watcher>, NamingError> {
    let path = uri.path().trim_start_matches('/');
    let target = if path.is_empty() {
        match (uri.host_str(), uri.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        }
    } else {
        path.to_string()
    };

    if let Some((_, freq)) = uri.query_pairs().find(|(key, _)| key == "freq") {
        let secs: u64 = freq
            .parse()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| NamingError::InvalidFrequency(freq.to_string()))?;
        config.freq = std::time::Duration::from_secs(secs);
    }

    DnsResolver::with_shared_lookup(scope.clone(), lookup)
        .config(config)
        .resolve(&target)
}

fn build_disco(
    scope: &Scope,
    uri: &Url,
    agent: Arc<dyn Agent>,
) -> Result<Box<dyn Watcher>, NamingError> {
    let service = uri.host_str().unwrap_or_default();
    let tags = uri
        .query_pairs()
        .filter(|(key, value)| key == "tag" && !value.is_empty())
        .map(|(_, value)| value.into_owned());

    DiscoResolver::new(scope.clone(), agent)
        .tags(tags)
        .resolve(service)
}
