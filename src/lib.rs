//! ipgate - IP allow/deny filtering for HTTP request pipelines.
//!
//! A [`Filter`] holds an ordered list of [`Rule`]s. Each rule is an allow or
//! deny action plus a set of sources: inline addresses and networks, local
//! files, remote lists, a provider's published ranges, or everything. Rule
//! contents are loaded once at startup and refreshed in the background, and
//! each request is classified by the first rule that matches its client
//! address.
//!
//! # Features
//!
//! - **Exact and CIDR matching**: IPv4 and IPv6, IPv4-mapped addresses folded
//! - **Many sources**: `1.2.3.4`, `10.0.0.0/8`, `file://...`, `https://...`,
//!   `cloudflare`, `all`
//! - **Hot refresh**: snapshots are swapped atomically, lookups never block
//! - **Fault isolation**: a failing source keeps its rule's last good contents
//! - **Proxy aware**: opt-in trust for `X-Forwarded-For` and `X-Real-IP`
//!
//! # Quick Start
//!
//! ```ignore
//! use ipgate::{Filter, FilterConfig, Verdict};
//!
//! let config = FilterConfig::default()
//!     .deny(["file:///etc/ipgate/deny.txt", "198.51.100.0/24"])
//!     .allow(["cloudflare"]);
//!
//! let mut filter = Filter::new(config)?;
//! filter.provision()?;
//!
//! match filter.classify(req.headers(), "203.0.113.7:51234") {
//!     Verdict::Allow => { /* continue */ }
//!     Verdict::Deny => { /* 403 */ }
//!     Verdict::InvalidInput => { /* 400 */ }
//! }
//! ```
//!
//! # Matching Order
//!
//! Rules are evaluated in configuration order:
//! 1. The first matching deny rule rejects the request
//! 2. The first matching allow rule accepts it and stops evaluation
//! 3. Requests no rule matches are allowed

mod action;
mod error;

pub mod config;
pub mod fetch;
pub mod filter;
pub mod list;
pub mod provider;
pub mod refresher;
pub mod rule;
pub mod source;

// Re-export core types
pub use action::Action;
pub use error::{Error, ErrorKind, Result};

pub use config::{FilterConfig, RuleSpec};
pub use fetch::{CancelToken, Fetcher, RefreshContext};
pub use filter::{ClientIpPolicy, Filter, Next, Verdict};
pub use list::{parse_lines, parse_text, ParsedList};
pub use provider::Provider;
pub use refresher::{CycleReport, Refresher, RefresherState};
pub use rule::{Rule, Snapshot};
pub use source::Source;
