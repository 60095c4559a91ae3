//! Source locations that feed a rule.
//!
//! Each location string is classified once, when the rule is built:
//!
//! - `http://...` / `https://...` → [`Source::Remote`]
//! - `file://<path>` → [`Source::File`]
//! - `cloudflare` → [`Source::Provider`]
//! - `all` → [`Source::All`] (`0.0.0.0/0` and `::/0`)
//! - anything else → [`Source::Literal`], a single inline address or CIDR

use std::fmt;
use std::path::PathBuf;

use crate::fetch::{Fetcher, RefreshContext};
use crate::provider::Provider;
use crate::Result;

/// Token that matches every address.
pub const ALL_TOKEN: &str = "all";

const FILE_PREFIX: &str = "file://";

/// A classified source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Inline address or network
    Literal(String),
    /// Local list file
    File(PathBuf),
    /// List served over HTTP(S)
    Remote(String),
    /// Published ranges of a well-known network
    Provider(Provider),
    /// Every IPv4 and IPv6 address
    All,
}

impl Source {
    /// Classify a location string.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Source::Remote(location.to_string())
        } else if let Some(path) = location.strip_prefix(FILE_PREFIX) {
            Source::File(PathBuf::from(path))
        } else if let Some(provider) = Provider::from_token(location) {
            Source::Provider(provider)
        } else if location == ALL_TOKEN {
            Source::All
        } else {
            Source::Literal(location.to_string())
        }
    }

    /// Obtain the raw list text for this source.
    pub fn load(&self, fetcher: &Fetcher, ctx: &RefreshContext) -> Result<String> {
        match self {
            Source::Remote(url) => fetcher.fetch_text(url, ctx),
            Source::File(path) => fetcher.read_file(path, ctx),
            Source::Provider(provider) => provider.fetch_list(fetcher, ctx),
            Source::All => Ok("0.0.0.0/0\n::/0".to_string()),
            Source::Literal(line) => Ok(line.clone()),
        }
    }
}

impl From<&str> for Source {
    fn from(location: &str) -> Self {
        Source::parse(location)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Literal(line) => f.write_str(line),
            Source::File(path) => write!(f, "{}{}", FILE_PREFIX, path.display()),
            Source::Remote(url) => f.write_str(url),
            Source::Provider(provider) => f.write_str(provider.token()),
            Source::All => f.write_str(ALL_TOKEN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::parse_text;

    #[test]
    fn test_classification() {
        assert_eq!(
            Source::parse("https://lists.example.com/bad.txt"),
            Source::Remote("https://lists.example.com/bad.txt".to_string())
        );
        assert_eq!(
            Source::parse("http://10.0.0.1/list"),
            Source::Remote("http://10.0.0.1/list".to_string())
        );
        assert_eq!(
            Source::parse("file:///etc/ipgate/deny.txt"),
            Source::File(PathBuf::from("/etc/ipgate/deny.txt"))
        );
        assert_eq!(
            Source::parse("cloudflare"),
            Source::Provider(Provider::Cloudflare)
        );
        assert_eq!(Source::parse("all"), Source::All);
        assert_eq!(
            Source::parse("10.0.0.0/8"),
            Source::Literal("10.0.0.0/8".to_string())
        );
        // A bare path without the scheme is an inline literal, not a file.
        assert_eq!(
            Source::parse("deny.txt"),
            Source::Literal("deny.txt".to_string())
        );
    }

    #[test]
    fn test_display_round_trips_location() {
        for location in [
            "file://lists/deny.txt",
            "https://example.com/a",
            "cloudflare",
            "all",
            "::1",
        ] {
            assert_eq!(Source::parse(location).to_string(), location);
        }
    }

    #[test]
    fn test_offline_sources_load_without_io() {
        let fetcher = Fetcher::new().unwrap();
        let ctx = RefreshContext::detached(std::time::Duration::from_secs(1));

        let all = parse_text(&Source::All.load(&fetcher, &ctx).unwrap());
        assert_eq!(all.networks.len(), 2);
        assert!(all.networks.iter().any(|n| n.to_string() == "0.0.0.0/0"));
        assert!(all.networks.iter().any(|n| n.to_string() == "::/0"));

        let literal = Source::parse("5.5.5.5").load(&fetcher, &ctx).unwrap();
        assert_eq!(literal, "5.5.5.5");
    }
}
