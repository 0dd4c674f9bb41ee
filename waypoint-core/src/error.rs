//! Error types for Waypoint naming and discovery.

/// Main error type for name resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
    /// The watcher was closed, either explicitly or through its scope.
    ///
    /// Consumers should stop draining the watcher when they see this.
    #[error("watcher closed")]
    WatcherClosed,

    /// No builder is registered for the scheme.
    #[error("resolver not found <{0}>")]
    ResolverNotFound(String),

    /// The name could not be parsed as a URI.
    #[error("invalid uri {uri:?}: {reason}")]
    InvalidUri {
        /// The offending input
        uri: String,
        /// Parser diagnostic
        reason: String,
    },

    /// The target is empty.
    #[error("missing address")]
    MissingAddress,

    /// The target is not a valid `host[:port]`.
    #[error("invalid target address {0}")]
    InvalidTarget(String),

    /// The DNS polling frequency could not be parsed.
    #[error("invalid DNS update frequency {0:?}")]
    InvalidFrequency(String),

    /// The discovery agent rejected the request.
    #[error("discovery error: {0}")]
    Disco(DiscoError),

    /// A DNS lookup failed.
    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Errors raised by a discovery agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoError {
    /// The subscription was closed.
    #[error("watcher closed")]
    WatcherClosed,

    /// An instance with this ID already exists.
    #[error("service already registered: {0}")]
    AlreadyRegistered(String),

    /// No instance of the service matches the query.
    #[error("service does not exist: {0}")]
    ServiceNotFound(String),

    /// The registration is malformed.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
}

impl From<DiscoError> for NamingError {
    fn from(e: DiscoError) -> Self {
        match e {
            DiscoError::WatcherClosed => Self::WatcherClosed,
            other => Self::Disco(other),
        }
    }
}

impl NamingError {
    /// Check if this error is the closed sentinel.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::WatcherClosed)
    }

    /// Create an invalid URI error.
    #[must_use]
    pub fn invalid_uri(uri: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NamingError::ResolverNotFound("foo".to_string());
        assert_eq!(err.to_string(), "resolver not found <foo>");

        let err = NamingError::invalid_uri("::", "empty host");
        assert_eq!(err.to_string(), "invalid uri \"::\": empty host");
    }

    #[test]
    fn test_disco_closed_maps_to_sentinel() {
        let err: NamingError = DiscoError::WatcherClosed.into();
        assert!(err.is_closed());

        let err: NamingError = DiscoError::ServiceNotFound("payments".into()).into();
        assert!(!err.is_closed());
        assert_eq!(
            err,
            NamingError::Disco(DiscoError::ServiceNotFound("payments".into()))
        );
    }
}
