//! Well-known providers that publish their own IP ranges.

use serde::Deserialize;

use crate::fetch::{Fetcher, RefreshContext};
use crate::{Error, Result};

/// Cloudflare's published IP ranges.
pub const CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4/ips";

/// A provider whose ranges can be used as a rule source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Cloudflare edge network
    Cloudflare,
}

impl Provider {
    /// Look up a provider by its source token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "cloudflare" => Some(Provider::Cloudflare),
            _ => None,
        }
    }

    /// Source token naming this provider.
    pub fn token(&self) -> &'static str {
        match self {
            Provider::Cloudflare => "cloudflare",
        }
    }

    /// Fetch the provider's ranges as list text, one CIDR per line.
    pub fn fetch_list(&self, fetcher: &Fetcher, ctx: &RefreshContext) -> Result<String> {
        match self {
            Provider::Cloudflare => {
                let body = fetcher.fetch_bytes(fetcher.cloudflare_endpoint(), ctx)?;
                cloudflare_list(&body)
            }
        }
    }
}

/// Response body of the Cloudflare IP ranges endpoint.
#[derive(Debug, Deserialize)]
struct CloudflareResponse {
    #[serde(default)]
    result: Option<CloudflareRanges>,
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudflareRanges {
    #[serde(default)]
    ipv4_cidrs: Vec<String>,
    #[serde(default)]
    ipv6_cidrs: Vec<String>,
}

/// Decode a Cloudflare payload into list text.
fn cloudflare_list(body: &[u8]) -> Result<String> {
    let provider = Provider::Cloudflare.token();
    let response: CloudflareResponse =
        serde_json::from_slice(body).map_err(|source| Error::ProviderPayload { provider, source })?;

    if !response.success {
        let message = if response.errors.is_empty() {
            "request unsuccessful".to_string()
        } else {
            response
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(Error::Provider { provider, message });
    }

    let ranges = response.result.unwrap_or_default();
    log::debug!(
        "Cloudflare published {} IPv4 and {} IPv6 ranges",
        ranges.ipv4_cidrs.len(),
        ranges.ipv6_cidrs.len()
    );

    Ok(ranges
        .ipv4_cidrs
        .iter()
        .chain(ranges.ipv6_cidrs.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n"))
}
