//! Filter configuration.
//!
//! A configuration can be built in code, deserialized from YAML/JSON, or read
//! from the block-directive format in [`directive`]:
//!
//! ```yaml
//! interval: 1h
//! timeout: 10s
//! trust_x_forwarded_for: true
//! rules:
//!   - deny: ["file:///etc/ipgate/deny.txt", "198.51.100.0/24"]
//!   - allow: [cloudflare]
//! ```

pub mod directive;
mod duration;

pub use duration::parse_duration;

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::filter::ClientIpPolicy;
use crate::{Action, Error, Result};

/// Default interval between periodic refreshes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default timeout of a single rule refresh.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One configured rule: an action and its source locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRule")]
pub struct RuleSpec {
    pub action: Action,
    pub sources: Vec<String>,
}

impl RuleSpec {
    /// Create a rule entry.
    pub fn new<I, S>(action: Action, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action,
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }
}

/// Serialized shape of a rule: `{allow: [...]}` or `{deny: [...]}`.
#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawRule {
    Allow(Vec<String>),
    Deny(Vec<String>),
}

impl From<RawRule> for RuleSpec {
    fn from(raw: RawRule) -> Self {
        match raw {
            RawRule::Allow(sources) => RuleSpec::new(Action::Allow, sources),
            RawRule::Deny(sources) => RuleSpec::new(Action::Deny, sources),
        }
    }
}

/// Configuration for a [`Filter`](crate::Filter).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Rules in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Interval between periodic refreshes
    #[serde(default = "default_interval", deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    /// Timeout of a single rule refresh
    #[serde(default, deserialize_with = "duration::deserialize_opt")]
    pub timeout: Option<Duration>,
    /// Trust the first `X-Forwarded-For` entry
    #[serde(default)]
    pub trust_x_forwarded_for: bool,
    /// Trust `X-Real-IP`
    #[serde(default)]
    pub trust_x_real_ip: bool,
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            interval: DEFAULT_INTERVAL,
            timeout: None,
            trust_x_forwarded_for: false,
            trust_x_real_ip: false,
        }
    }
}

impl FilterConfig {
    /// Append an allow rule.
    pub fn allow<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(RuleSpec::new(Action::Allow, sources));
        self
    }

    /// Append a deny rule.
    pub fn deny<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(RuleSpec::new(Action::Deny, sources));
        self
    }

    /// Set the refresh interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the per-rule refresh timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Trust or distrust `X-Forwarded-For`.
    pub fn trust_x_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_x_forwarded_for = trust;
        self
    }

    /// Trust or distrust `X-Real-IP`.
    pub fn trust_x_real_ip(mut self, trust: bool) -> Self {
        self.trust_x_real_ip = trust;
        self
    }

    /// Interval actually used; zero means the default.
    pub fn effective_interval(&self) -> Duration {
        if self.interval.is_zero() {
            DEFAULT_INTERVAL
        } else {
            self.interval
        }
    }

    /// Timeout actually used; unset or zero means the default.
    pub fn effective_timeout(&self) -> Duration {
        match self.timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => DEFAULT_TIMEOUT,
        }
    }

    /// Client address policy described by the trust flags.
    pub fn client_ip_policy(&self) -> ClientIpPolicy {
        ClientIpPolicy::new(self.trust_x_forwarded_for, self.trust_x_real_ip)
    }

    /// Reject configurations that cannot be provisioned.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::Config(
                "at least 1 ip filter rule needs to be provided".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse YAML (or JSON) text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse block-directive text.
    pub fn from_directive_str(text: &str) -> Result<Self> {
        directive::parse(text)
    }

    /// Load a configuration file.
    ///
    /// `.yaml`, `.yml` and `.json` files are read as YAML, anything else as
    /// block directives.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml" | "json")
        );
        if is_yaml {
            Self::from_yaml_str(&text)
        } else {
            Self::from_directive_str(&text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.effective_interval(), Duration::from_secs(3600));
        assert_eq!(config.effective_timeout(), Duration::from_secs(30));
        assert_eq!(config.client_ip_policy(), ClientIpPolicy::default());
    }

    #[test]
    fn test_zero_values_fall_back() {
        let config = FilterConfig::default()
            .with_interval(Duration::ZERO)
            .with_timeout(Duration::ZERO);
        assert_eq!(config.effective_interval(), DEFAULT_INTERVAL);
        assert_eq!(config.effective_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            FilterConfig::default().validate(),
            Err(Error::Config(_))
        ));
        assert!(FilterConfig::default().allow(["all"]).validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
interval: 15m
timeout: 5s
trust_x_real_ip: true
rules:
  - deny: ["file:///etc/ipgate/deny.txt", "198.51.100.0/24"]
  - allow: [cloudflare]
"#;
        let config = FilterConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.interval, Duration::from_secs(900));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert!(config.trust_x_real_ip);
        assert!(!config.trust_x_forwarded_for);
        assert_eq!(
            config.rules,
            vec![
                RuleSpec::new(
                    Action::Deny,
                    ["file:///etc/ipgate/deny.txt", "198.51.100.0/24"]
                ),
                RuleSpec::new(Action::Allow, ["cloudflare"]),
            ]
        );
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"rules": [{"allow": ["10.0.0.0/8"]}]}"#;
        let config = FilterConfig::from_yaml_str(json).unwrap();
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.timeout, None);
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn test_yaml_rejects_bad_input() {
        assert!(FilterConfig::from_yaml_str("interval: soon\nrules: []").is_err());
        assert!(FilterConfig::from_yaml_str("rules:\n  - block: [1.2.3.4]").is_err());
        assert!(FilterConfig::from_yaml_str("rulez: []").is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("filter.yaml");
        fs::write(&yaml_path, "rules:\n  - deny: [1.2.3.4]\n").unwrap();
        let config = FilterConfig::load(&yaml_path).unwrap();
        assert_eq!(config.rules, vec![RuleSpec::new(Action::Deny, ["1.2.3.4"])]);

        let directive_path = dir.path().join("filter.conf");
        fs::write(&directive_path, "ip_filter {\n  deny 1.2.3.4\n}\n").unwrap();
        assert_eq!(FilterConfig::load(&directive_path).unwrap(), config);

        assert!(matches!(
            FilterConfig::load(dir.path().join("missing.yaml")),
            Err(Error::ReadFile { .. })
        ));
    }
}
