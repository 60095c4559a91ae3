//! Allow/deny action carried by each rule.

use std::fmt;

/// Action represents the verdict a rule hands out when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Let the request through
    Allow,
    /// Reject the request
    Deny,
}

impl Action {
    /// Build an action from the rule's allow flag.
    pub fn from_allow(allow: bool) -> Self {
        if allow {
            Action::Allow
        } else {
            Action::Deny
        }
    }

    /// Whether this is the allow action.
    pub fn is_allow(self) -> bool {
        self == Action::Allow
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            _ => Err(()),
        }
    }
}
