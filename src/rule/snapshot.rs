//! Immutable set of addresses and networks a rule matches against.

use ahash::AHashSet;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::list::{canonical_ip, ParsedList};

/// One published generation of a rule's contents.
///
/// Snapshots are never mutated after construction; a refresh builds a new one
/// and swaps it in.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Exact addresses in canonical string form
    ips: AHashSet<String>,
    /// IPv4 networks
    v4_cidrs: Vec<Ipv4Net>,
    /// IPv6 networks
    v6_cidrs: Vec<Ipv6Net>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of exact addresses.
    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    /// Number of networks across both families.
    pub fn network_count(&self) -> usize {
        self.v4_cidrs.len() + self.v6_cidrs.len()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.ip_count() + self.network_count()
    }

    /// Check if the snapshot matches nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact addresses.
    pub fn ips(&self) -> impl Iterator<Item = &str> {
        self.ips.iter().map(String::as_str)
    }

    /// Networks, IPv4 first.
    pub fn networks(&self) -> impl Iterator<Item = IpNet> + '_ {
        self.v4_cidrs
            .iter()
            .copied()
            .map(IpNet::V4)
            .chain(self.v6_cidrs.iter().copied().map(IpNet::V6))
    }

    /// Check if an address is listed exactly or falls in a listed network.
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        if self.ips.contains(&canonical_ip(ip)) {
            return true;
        }
        match ip {
            IpAddr::V4(v4) => self.contains_v4(v4),
            IpAddr::V6(v6) => self.contains_v6(v6),
        }
    }

    fn contains_v4(&self, ip: Ipv4Addr) -> bool {
        self.v4_cidrs.iter().any(|cidr| cidr.contains(&ip))
    }

    fn contains_v6(&self, ip: Ipv6Addr) -> bool {
        self.v6_cidrs.iter().any(|cidr| cidr.contains(&ip))
    }
}

impl From<ParsedList> for Snapshot {
    fn from(parsed: ParsedList) -> Self {
        let mut v4_cidrs = Vec::new();
        let mut v6_cidrs = Vec::new();
        for network in parsed.networks {
            match network {
                IpNet::V4(net) => v4_cidrs.push(net),
                IpNet::V6(net) => v6_cidrs.push(net),
            }
        }
        Self {
            ips: parsed.ips,
            v4_cidrs,
            v6_cidrs,
        }
    }
}
