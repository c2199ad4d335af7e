use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitcherError};

use super::ProxyProtocol;

/// Routing outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Allow,
    Deny,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allow => "allow",
            Outcome::Deny => "deny",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome applied when no rule matches a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    /// Direct connection, no proxy
    #[default]
    Allow,
    Deny,
}

impl DefaultPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultPolicy::Allow => "allow",
            DefaultPolicy::Deny => "deny",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Some(DefaultPolicy::Allow),
            "deny" => Some(DefaultPolicy::Deny),
            _ => None,
        }
    }
}

/// Result of a single routing decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    /// None means the default policy applied
    pub matched_rule: Option<String>,
    /// Only set for allow verdicts routed through a proxy
    pub selected_proxy: Option<String>,
}

impl Verdict {
    pub fn deny(matched_rule: Option<String>) -> Self {
        Self {
            outcome: Outcome::Deny,
            matched_rule,
            selected_proxy: None,
        }
    }

    pub fn allow(matched_rule: Option<String>, selected_proxy: Option<String>) -> Self {
        Self {
            outcome: Outcome::Allow,
            matched_rule,
            selected_proxy,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == Outcome::Allow
    }

    pub fn is_direct(&self) -> bool {
        self.is_allowed() && self.selected_proxy.is_none()
    }
}

/// Routing request as submitted over the command surface
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRequest {
    pub host: String,
    #[serde(default)]
    pub ip: Option<IpAddr>,
    #[serde(default)]
    pub protocol: Option<String>,
}

impl RouteRequest {
    pub fn preferred_protocol(&self) -> Result<Option<ProxyProtocol>> {
        parse_preferred_protocol(self.protocol.as_deref())
    }
}

/// Parse an optional protocol preference; blank means no preference
pub fn parse_preferred_protocol(raw: Option<&str>) -> Result<Option<ProxyProtocol>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => ProxyProtocol::from_str(raw).map(Some).ok_or_else(|| {
            SwitcherError::validation(format!("Unsupported proxy protocol: {}", raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_parsing() {
        assert_eq!(DefaultPolicy::default(), DefaultPolicy::Allow);
        assert_eq!(DefaultPolicy::from_str("DENY"), Some(DefaultPolicy::Deny));
        assert_eq!(DefaultPolicy::from_str("block"), None);
    }

    #[test]
    fn test_verdict_helpers() {
        let direct = Verdict::allow(None, None);
        assert!(direct.is_allowed());
        assert!(direct.is_direct());

        let proxied = Verdict::allow(Some("r1".into()), Some("p1".into()));
        assert!(!proxied.is_direct());

        let denied = Verdict::deny(Some("r2".into()));
        assert!(!denied.is_allowed());
        assert!(!denied.is_direct());
        assert!(denied.selected_proxy.is_none());
    }

    #[test]
    fn test_route_request_protocol() {
        let req = RouteRequest {
            host: "example.com".into(),
            ip: None,
            protocol: Some("SOCKS5".into()),
        };
        assert_eq!(req.preferred_protocol().unwrap(), Some(ProxyProtocol::Socks5));

        let req = RouteRequest {
            host: "example.com".into(),
            ip: None,
            protocol: Some("gopher".into()),
        };
        assert!(req.preferred_protocol().is_err());
    }
}
