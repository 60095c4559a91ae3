//! Plain-text IP list parser.
//!
//! A list is newline-delimited text where every line is either a single
//! address (`203.0.113.7`, `2001:db8::1`) or a CIDR network
//! (`198.51.100.0/24`, `2001:db8::/32`). Anything else is skipped, so comments
//! and stray entries in third-party lists never fail a load.

use ahash::AHashSet;
use ipnet::IpNet;
use std::net::IpAddr;

/// Exact addresses and networks parsed out of one or more lists.
#[derive(Debug, Default, Clone)]
pub struct ParsedList {
    /// Canonical string form of every exact address
    pub ips: AHashSet<String>,
    /// Networks, truncated to their network address
    pub networks: Vec<IpNet>,
}

impl ParsedList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.ips.len() + self.networks.len()
    }

    /// Check if nothing was parsed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical string used as the exact-match key for an address.
///
/// IPv4-mapped IPv6 addresses collapse to their IPv4 form.
pub fn canonical_ip(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}

/// Parse a whole list body.
pub fn parse_text(content: &str) -> ParsedList {
    parse_lines(content.split('\n'))
}

/// Parse individual lines into a [`ParsedList`].
///
/// Lines are trimmed, blank and repeated lines are skipped, CIDR parsing is
/// attempted before single-address parsing.
pub fn parse_lines<'a, I>(lines: I) -> ParsedList
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parsed = ParsedList::new();
    let mut seen: AHashSet<&str> = AHashSet::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() || !seen.insert(line) {
            continue;
        }

        if let Ok(network) = line.parse::<IpNet>() {
            parsed.networks.push(network.trunc());
        } else if let Ok(ip) = line.parse::<IpAddr>() {
            parsed.ips.insert(canonical_ip(ip));
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_list() {
        let parsed = parse_text("1.1.1.1\n2.2.2.0/24\n::1\n2001:db8::/32\n");

        assert_eq!(parsed.ips.len(), 2);
        assert!(parsed.ips.contains("1.1.1.1"));
        assert!(parsed.ips.contains("::1"));
        assert_eq!(parsed.networks.len(), 2);
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn test_skips_blank_and_malformed_lines() {
        let parsed = parse_text("# blocklist v3\n\n   \nnot-an-ip\n10.0.0.0/33\n8.8.8.8\r\n");

        assert_eq!(parsed.ips.len(), 1);
        assert!(parsed.ips.contains("8.8.8.8"));
        assert!(parsed.networks.is_empty());
    }

    #[test]
    fn test_deduplicates_within_one_pass() {
        let parsed = parse_lines(["10.0.0.0/8", " 10.0.0.0/8 ", "1.2.3.4", "1.2.3.4"]);

        assert_eq!(parsed.networks.len(), 1);
        assert_eq!(parsed.ips.len(), 1);
    }

    #[test]
    fn test_networks_are_truncated() {
        let parsed = parse_lines(["192.168.1.77/24"]);
        assert_eq!(parsed.networks[0].to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_ip_normalization() {
        let parsed = parse_lines(["2001:DB8:0:0::1", "::ffff:192.0.2.1"]);

        assert!(parsed.ips.contains("2001:db8::1"));
        assert!(parsed.ips.contains("192.0.2.1"));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_text("").is_empty());
    }
}
