//! Client address derivation.
//!
//! Forwarding headers are only honoured when explicitly trusted. A filter that
//! is not behind a reverse proxy must leave both flags off, otherwise any
//! client can pick the address it is judged by.

use http::HeaderMap;
use std::borrow::Cow;
use std::net::IpAddr;

use crate::{Error, Result};

/// Header carrying the proxy chain, client first.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Header carrying the client address set by a single proxy.
pub const X_REAL_IP: &str = "x-real-ip";

/// Which request headers may name the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIpPolicy {
    /// Use the first `X-Forwarded-For` entry when present
    pub trust_x_forwarded_for: bool,
    /// Use `X-Real-IP` when present
    pub trust_x_real_ip: bool,
}

impl ClientIpPolicy {
    /// Create a policy.
    pub fn new(trust_x_forwarded_for: bool, trust_x_real_ip: bool) -> Self {
        Self {
            trust_x_forwarded_for,
            trust_x_real_ip,
        }
    }

    /// Derive the client address string.
    ///
    /// Header values are not validated here; the caller parses the result.
    /// An unparsable `remote_addr` yields an empty string.
    pub fn client_ip(&self, headers: &HeaderMap, remote_addr: &str) -> String {
        if self.trust_x_forwarded_for {
            if let Some(xff) = header_str(headers, X_FORWARDED_FOR) {
                if let Some(first) = xff.split(',').next() {
                    return first.trim().to_string();
                }
            }
        }
        if self.trust_x_real_ip {
            if let Some(real_ip) = header_str(headers, X_REAL_IP) {
                return real_ip.to_string();
            }
        }
        split_host_port(remote_addr).unwrap_or_default().to_string()
    }

    /// Derive and parse the client address.
    pub fn resolve(&self, headers: &HeaderMap, remote_addr: &str) -> Result<IpAddr> {
        let client = self.client_ip(headers, remote_addr);
        client
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .map_err(|_| Error::InvalidClientAddress(client))
    }
}

/// Non-empty value of a header.
///
/// Bytes that are not UTF-8 are replaced rather than dropped, so a garbled
/// trusted header fails address parsing instead of being ignored.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
        .filter(|value| !value.is_empty())
}

/// Host part of a `host:port` transport address.
///
/// IPv6 hosts must be bracketed (`[::1]:8080`). Addresses without a port are
/// rejected.
pub fn split_host_port(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        tail.strip_prefix(':')?;
        return Some(host);
    }
    let (host, _port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some(host)
}
