//! Target parsing.

use std::net::IpAddr;

use waypoint_core::{NamingError, join_host_port};

/// A parsed `host:port` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name or IP literal, without brackets.
    pub host: String,

    /// Port number.
    pub port: u16,
}

impl Target {
    /// The host as an IP address, if it is a literal.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// `host:port` with IPv6 hosts bracketed.
    #[must_use]
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

/// Parse a user supplied target into host and port.
///
/// A missing port is replaced by `default_port`, an empty host by
/// `localhost`. Brackets around IPv6 hosts are stripped.
///
/// | target          | host          | port           |
/// |-----------------|---------------|----------------|
/// | `example.com`   | `example.com` | `default_port` |
/// | `ipv4-host:80`  | `ipv4-host`   | `80`           |
/// | `[ipv6-host]`   | `ipv6-host`   | `default_port` |
/// | `:80`           | `localhost`   | `80`           |
/// | `:`             | `localhost`   | `default_port` |
pub fn parse_target(target: &str, default_port: u16) -> Result<Target, NamingError> {
    if target.is_empty() {
        return Err(NamingError::MissingAddress);
    }

    if target.parse::<IpAddr>().is_ok() {
        return Ok(Target {
            host: target.to_string(),
            port: default_port,
        });
    }

    // A target without port separator is retried as `target:`.
    let padded = format!("{target}:");
    let (host, port) = split_host_port(target)
        .or_else(|| split_host_port(&padded))
        .ok_or_else(|| NamingError::InvalidTarget(target.to_string()))?;

    let host = if host.is_empty() { "localhost" } else { host };
    let port = if port.is_empty() {
        default_port
    } else {
        port.parse()
            .map_err(|_| NamingError::InvalidTarget(target.to_string()))?
    };

    Ok(Target {
        host: host.to_string(),
        port,
    })
}

/// Split `host:port`, `[host]:port` into host and port. `None` when there
/// is no port separator or the host is malformed.
fn split_host_port(input: &str) -> Option<(&str, &str)> {
    if let Some(rest) = input.strip_prefix('[') {
        let end = rest.find(']')?;
        let host = &rest[..end];
        let port = rest[end + 1..].strip_prefix(':')?;
        if port.contains(':') {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = input.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(target: &str) -> (String, u16) {
        let t = parse_target(target, 443).unwrap();
        (t.host, t.port)
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse("www.example.com"), ("www.example.com".into(), 443));
        assert_eq!(parse("ipv4-host:80"), ("ipv4-host".into(), 80));
        assert_eq!(parse("[ipv6-host]"), ("ipv6-host".into(), 443));
        assert_eq!(parse("[::1]:8080"), ("::1".into(), 8080));
        assert_eq!(parse("[::1]:"), ("::1".into(), 443));
        assert_eq!(parse(":80"), ("localhost".into(), 80));
        assert_eq!(parse(":"), ("localhost".into(), 443));
    }

    #[test]
    fn test_parse_without_port_separator() {
        let target = parse_target("payments.internal", 8443).unwrap();
        assert_eq!(target.host, "payments.internal");
        assert_eq!(target.port, 8443);
        assert_eq!(target.addr(), "payments.internal:8443");

        let target = parse_target("[fd00::1]", 8443).unwrap();
        assert_eq!(target.addr(), "[fd00::1]:8443");
    }

    #[test]
    fn test_parse_ip_literals() {
        assert_eq!(parse("10.0.0.1"), ("10.0.0.1".into(), 443));
        assert_eq!(parse("2001:db8::1"), ("2001:db8::1".into(), 443));

        let target = parse_target("2001:db8::1", 443).unwrap();
        assert!(target.ip().is_some());
        assert_eq!(target.addr(), "[2001:db8::1]:443");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_target("", 443), Err(NamingError::MissingAddress));
        assert!(matches!(
            parse_target("host:http", 443),
            Err(NamingError::InvalidTarget(_))
        ));
        assert!(matches!(
            parse_target("[::1", 443),
            Err(NamingError::InvalidTarget(_))
        ));
        assert!(matches!(
            parse_target("a:b:c", 443),
            Err(NamingError::InvalidTarget(_))
        ));
    }
}
