//! Allow/deny rules backed by refreshable IP lists.

mod snapshot;

pub use snapshot::Snapshot;

use ahash::AHashSet;
use arc_swap::ArcSwap;
use ipnet::IpNet;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

use crate::fetch::{Fetcher, RefreshContext};
use crate::list::{parse_text, ParsedList};
use crate::source::Source;
use crate::{Action, Result};

/// A rule matches client addresses against the union of its sources.
///
/// The rule starts out empty and is populated by [`Rule::refresh`]. Lookups
/// read the current [`Snapshot`] without locking; a refresh builds a complete
/// replacement and publishes it in one atomic store, so concurrent readers see
/// either the old contents or the new ones, never a mix.
///
/// # Examples
/// ```
/// use ipgate::fetch::{Fetcher, RefreshContext};
/// use ipgate::Rule;
/// use std::time::Duration;
///
/// let rule = Rule::deny(["203.0.113.7", "198.51.100.0/24"]);
/// let fetcher = Fetcher::new().unwrap();
/// rule.refresh(&fetcher, &RefreshContext::detached(Duration::from_secs(5))).unwrap();
///
/// assert!(rule.matches("198.51.100.20".parse().unwrap()));
/// ```
#[derive(Debug)]
pub struct Rule {
    action: Action,
    /// Locations as given in the configuration
    locations: Vec<String>,
    /// Locations classified once at construction
    sources: Vec<Source>,
    snapshot: ArcSwap<Snapshot>,
    /// Serializes writers; held from the first load until publication
    writer: Mutex<()>,
    /// Written only while `writer` is held
    refreshed_at: Mutex<Option<SystemTime>>,
}

impl Rule {
    /// Create a rule with the given action and source locations.
    pub fn new<I, S>(action: Action, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locations: Vec<String> = locations.into_iter().map(Into::into).collect();
        let sources = locations.iter().map(|l| Source::parse(l)).collect();
        Self {
            action,
            locations,
            sources,
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            writer: Mutex::new(()),
            refreshed_at: Mutex::new(None),
        }
    }

    /// Create an allow rule.
    pub fn allow<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Action::Allow, locations)
    }

    /// Create a deny rule.
    pub fn deny<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Action::Deny, locations)
    }

    /// Get the action of this rule.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Check if this is an allow rule.
    pub fn is_allow(&self) -> bool {
        self.action.is_allow()
    }

    /// Source locations as configured.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Classified sources.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Check an address against the current snapshot.
    pub fn matches(&self, ip: IpAddr) -> bool {
        self.snapshot.load().contains(ip)
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Number of exact addresses in the current snapshot.
    pub fn ip_count(&self) -> usize {
        self.snapshot.load().ip_count()
    }

    /// Number of networks in the current snapshot.
    pub fn network_count(&self) -> usize {
        self.snapshot.load().network_count()
    }

    /// Total entries in the current snapshot.
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Check if the current snapshot matches nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the snapshot was last replaced.
    pub fn last_refreshed(&self) -> Option<SystemTime> {
        *self.refreshed_at.lock()
    }

    /// Load every source and replace the snapshot.
    ///
    /// Any failing source aborts the refresh and leaves the previous snapshot
    /// in place. Concurrent refreshes of one rule run one after another, so a
    /// slow refresh can never overwrite the result of a later one.
    pub fn refresh(&self, fetcher: &Fetcher, ctx: &RefreshContext) -> Result<()> {
        let _writer = self.writer.lock();
        let mut merged = ParsedList::new();
        let mut seen_networks: AHashSet<IpNet> = AHashSet::new();

        for source in &self.sources {
            let parsed = parse_text(&source.load(fetcher, ctx)?);
            merged.ips.extend(parsed.ips);
            for network in parsed.networks {
                if seen_networks.insert(network) {
                    merged.networks.push(network);
                }
            }
        }

        log::info!(
            "Refreshed {} rule: {} addresses, {} networks from {} sources",
            self.action,
            merged.ips.len(),
            merged.networks.len(),
            self.sources.len()
        );
        self.publish(merged);
        Ok(())
    }

    /// Publish a new snapshot built from `parsed`.
    pub fn replace(&self, parsed: ParsedList) {
        let _writer = self.writer.lock();
        self.publish(parsed);
    }

    /// Caller must hold `writer`.
    fn publish(&self, parsed: ParsedList) {
        self.snapshot.store(Arc::new(Snapshot::from(parsed)));
        *self.refreshed_at.lock() = Some(SystemTime::now());
    }
}
