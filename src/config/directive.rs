//! Block-directive configuration format.
//!
//! ```text
//! ip_filter {
//!     interval 1h
//!     timeout 10s
//!     deny file:///etc/ipgate/deny.txt https://lists.example.com/bad.txt
//!     allow cloudflare
//!     trust_x_forwarded_for
//! }
//! ```
//!
//! One subdirective per line, arguments separated by whitespace, `#` starts a
//! comment.

use std::time::Duration;

use super::duration::parse_duration;
use super::{FilterConfig, RuleSpec};
use crate::{Action, Error, Result};

/// Name of the block.
pub const DIRECTIVE: &str = "ip_filter";

/// Parser state.
enum State {
    /// Expecting `ip_filter {`
    Outside,
    /// Inside a block
    Block,
}

/// Parse directive text into a configuration.
///
/// The result is not validated; see [`FilterConfig::validate`].
pub fn parse(text: &str) -> Result<FilterConfig> {
    let mut config = FilterConfig::default();
    let mut state = State::Outside;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let err = |msg: String| Error::Config(format!("line {}: {}", line_no, msg));

        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = tokens.split_first() else {
            continue;
        };

        match state {
            State::Outside => match (head, args) {
                (DIRECTIVE, ["{"]) => state = State::Block,
                (DIRECTIVE, []) => {}
                (DIRECTIVE, _) => return Err(err(format!("expected '{{' after {}", DIRECTIVE))),
                _ => return Err(err(format!("unrecognized directive '{}'", head))),
            },
            State::Block => match head {
                "}" if args.is_empty() => state = State::Outside,
                "interval" => config.interval = duration_arg(head, args).map_err(err)?,
                "timeout" => config.timeout = Some(duration_arg(head, args).map_err(err)?),
                "allow" | "deny" => {
                    let action = if head == "allow" { Action::Allow } else { Action::Deny };
                    config.rules.push(RuleSpec::new(action, args.iter().copied()));
                }
                "trust_x_forwarded_for" => config.trust_x_forwarded_for = true,
                "trust_x_real_ip" => config.trust_x_real_ip = true,
                _ => return Err(err(format!("unrecognized subdirective '{}'", head))),
            },
        }
    }

    if let State::Block = state {
        return Err(Error::Config(format!("unterminated {} block", DIRECTIVE)));
    }
    Ok(config)
}

fn single_arg<'a>(name: &str, args: &[&'a str]) -> std::result::Result<&'a str, String> {
    match args {
        [value] => Ok(*value),
        _ => Err(format!("{} takes exactly one argument", name)),
    }
}

/// Single duration argument of a subdirective.
fn duration_arg(head: &str, args: &[&str]) -> std::result::Result<Duration, String> {
    let value = single_arg(head, args)?;
    parse_duration(value).map_err(|e| match e {
        Error::Config(msg) => msg,
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_block() {
        let text = r#"
ip_filter {
    interval 1h
    timeout 10s
    deny blockIPList.txt blockIPList2.txt
    allow allowIPList.txt allowIPList2.txt
}
"#;
        let config = parse(text).unwrap();

        assert_eq!(
            config.rules,
            vec![
                RuleSpec::new(Action::Deny, ["blockIPList.txt", "blockIPList2.txt"]),
                RuleSpec::new(Action::Allow, ["allowIPList.txt", "allowIPList2.txt"]),
            ]
        );
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert!(!config.trust_x_forwarded_for);
        assert!(!config.trust_x_real_ip);
    }

    #[test]
    fn test_trust_flags_and_comments() {
        let text = "ip_filter {\n  # proxies in front of us\n  trust_x_forwarded_for\n  trust_x_real_ip # nginx\n  allow all\n}\n";
        let config = parse(text).unwrap();

        assert!(config.trust_x_forwarded_for);
        assert!(config.trust_x_real_ip);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_bad_duration_reports_line() {
        let err = parse("ip_filter {\n  deny 1.2.3.4\n  interval soon\n}").unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_unknown_subdirective() {
        let err = parse("ip_filter {\n  block 1.2.3.4\n}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("unrecognized subdirective 'block'"));
    }

    #[test]
    fn test_missing_argument() {
        assert!(parse("ip_filter {\n  interval\n}").is_err());
        assert!(parse("ip_filter {\n  timeout 1s 2s\n}").is_err());
        assert!(parse("ip_filter {\n  interval soon\n}").is_err());
    }

    #[test]
    fn test_unterminated_block() {
        assert!(parse("ip_filter {\n  allow all\n").is_err());
    }

    #[test]
    fn test_empty_directive_has_no_rules() {
        let config = parse("ip_filter\n").unwrap();
        assert!(config.rules.is_empty());
        assert!(config.validate().is_err());
    }
}
