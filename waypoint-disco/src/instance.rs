//! Service instances and registrations.

use waypoint_core::join_host_port;

/// A remotely-accessible occurrence of a named service.
///
/// Instances are immutable once stored in a catalogue; changing one means
/// deregistering it and registering a replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Whether this instance was registered by the local process.
    pub local: bool,

    /// Unique instance identifier.
    pub id: String,

    /// Service name.
    pub name: String,

    /// IP address or DNS name.
    pub host: String,

    /// Port on which the service runs.
    pub port: u16,

    /// Tags of this instance.
    pub tags: Vec<String>,
}

impl Instance {
    /// The instance address as `host:port`.
    #[must_use]
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// Check that the instance carries every tag in `tags`.
    #[must_use]
    pub fn has_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|t| self.tags.contains(t))
    }
}

/// Request to add a service instance to a catalogue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    /// Instance identifier. Generated at registration time when absent.
    pub id: Option<String>,

    /// Service name.
    pub name: String,

    /// IP address or DNS name.
    pub host: String,

    /// Port on which the service runs.
    pub port: u16,

    /// Instance tags.
    pub tags: Vec<String>,
}

impl Registration {
    /// Create a registration for `name` reachable at `host:port`.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: None,
            name: name.into(),
            host: host.into(),
            port,
            tags: Vec::new(),
        }
    }

    /// Set an explicit instance ID.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
