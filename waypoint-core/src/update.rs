//! Address-level update vocabulary shared by every resolver.

use std::collections::HashMap;
use std::fmt;

/// Metadata key-value pairs attached to an address.
pub type Metadata = HashMap<String, String>;

/// Operation carried by an [`Update`].
///
/// `Add` is the default so newly observed addresses need no explicit tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Op {
    /// The address joined the set.
    #[default]
    Add,
    /// The address left the set.
    Delete,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// A change to the address set of a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// Whether the address was added or removed.
    pub op: Op,

    /// `host:port`, IPv6 hosts bracketed.
    pub addr: String,

    /// Optional metadata about the address.
    pub metadata: Option<Metadata>,
}

impl Update {
    /// Announce a new address.
    #[must_use]
    pub fn add(addr: impl Into<String>) -> Self {
        Self {
            op: Op::Add,
            addr: addr.into(),
            metadata: None,
        }
    }

    /// Withdraw an address.
    #[must_use]
    pub fn delete(addr: impl Into<String>) -> Self {
        Self {
            op: Op::Delete,
            addr: addr.into(),
            metadata: None,
        }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Combine host and port into `host:port`, bracketing IPv6 hosts.
#[must_use]
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
