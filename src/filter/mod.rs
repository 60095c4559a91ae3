//! The rule engine: ordered rules plus client address policy.

mod client_ip;
mod middleware;

pub use client_ip::{split_host_port, ClientIpPolicy, X_FORWARDED_FOR, X_REAL_IP};
pub use middleware::Next;

use http::HeaderMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::fetch::Fetcher;
use crate::refresher::{CycleReport, Refresher};
use crate::{FilterConfig, Result, Rule};

/// Classification outcome for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Continue to the next handler
    Allow,
    /// Reject with 403
    Deny,
    /// Client address could not be parsed; reject with 400
    InvalidInput,
}

/// An IP filter: rules evaluated in order, first match wins.
///
/// An address no rule matches is allowed. Deny rules placed before broader
/// allow rules carve blocked subsets out of an allowed range, and vice versa.
///
/// # Example
///
/// ```ignore
/// use ipgate::{Filter, FilterConfig};
///
/// let config = FilterConfig::default()
///     .deny(["file:///etc/ipgate/deny.txt"])
///     .allow(["cloudflare"]);
///
/// let mut filter = Filter::new(config)?;
/// filter.provision()?; // initial load, then background refresh
///
/// let verdict = filter.classify(request.headers(), "203.0.113.7:51234");
/// ```
pub struct Filter {
    rules: Vec<Arc<Rule>>,
    policy: ClientIpPolicy,
    refresher: Refresher,
}

impl Filter {
    /// Build a filter from a validated configuration.
    pub fn new(config: FilterConfig) -> Result<Self> {
        Self::with_fetcher(config, Fetcher::new()?)
    }

    /// Build a filter that loads sources through `fetcher`.
    pub fn with_fetcher(config: FilterConfig, fetcher: Fetcher) -> Result<Self> {
        config.validate()?;

        let rules: Vec<Arc<Rule>> = config
            .rules
            .iter()
            .map(|spec| Arc::new(Rule::new(spec.action, spec.sources.iter().cloned())))
            .collect();
        let refresher = Refresher::new(
            rules.clone(),
            Arc::new(fetcher),
            config.effective_interval(),
            config.effective_timeout(),
        );

        Ok(Self {
            rules,
            policy: config.client_ip_policy(),
            refresher,
        })
    }

    /// Load every rule, then start periodic refresh.
    ///
    /// Fails if any source of any rule cannot be loaded.
    pub fn provision(&mut self) -> Result<()> {
        self.refresher.initialize()?;
        self.refresher.start()?;
        log::info!(
            "IP filter ready: {} rules, refresh every {:?} with {:?} timeout",
            self.rules.len(),
            self.refresher.interval(),
            self.refresher.timeout()
        );
        Ok(())
    }

    /// Stop periodic refresh.
    pub fn shutdown(&mut self) {
        self.refresher.stop();
    }

    /// Run a refresh cycle immediately on the calling thread.
    pub fn refresh_now(&self) -> CycleReport {
        self.refresher.refresh_cycle()
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Client address policy.
    pub fn policy(&self) -> ClientIpPolicy {
        self.policy
    }

    /// The background refresher.
    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// Evaluate the rules for an address.
    pub fn classify_ip(&self, ip: IpAddr) -> Verdict {
        for rule in &self.rules {
            if !rule.matches(ip) {
                continue;
            }
            if rule.is_allow() {
                break;
            }
            return Verdict::Deny;
        }
        Verdict::Allow
    }

    /// Classify a request from its headers and transport address.
    pub fn classify(&self, headers: &HeaderMap, remote_addr: &str) -> Verdict {
        let ip = match self.policy.resolve(headers, remote_addr) {
            Ok(ip) => ip,
            Err(e) => {
                log::debug!("Rejecting request: {}", e);
                return Verdict::InvalidInput;
            }
        };
        log::debug!("Client IP: {}", ip);

        let verdict = self.classify_ip(ip);
        if verdict == Verdict::Deny {
            log::warn!("Access blocked: {}", ip);
        }
        verdict
    }
}
