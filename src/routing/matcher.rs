//! Rule matching
//!
//! Rule values are compiled into a [`RulePattern`] when a rule enters the
//! table, so matching a target is allocation-free and never fails. No DNS
//! lookups happen here: `ip` and `cidr` rules only see the IP the caller
//! resolved (or the host itself when it is an IP literal).

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net};

use crate::error::{Result, SwitcherError};
use crate::models::{ProxyRule, RuleType};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Connection target as seen by the matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    host: String,
    ip: Option<IpAddr>,
}

impl RouteTarget {
    /// Normalizes the host and falls back to the host itself when it is an
    /// IP literal and no resolved IP was supplied.
    pub fn new(host: &str, ip: Option<IpAddr>) -> Self {
        let host = normalize_host(host);
        let ip = ip
            .or_else(|| host.parse::<IpAddr>().ok())
            .map(|ip| ip.to_canonical());
        Self { host, ip }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }
}

/// Compiled form of a rule value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePattern {
    /// Exact, lowercase name
    Domain(String),
    /// `*.suffix`; holds the suffix without the wildcard label
    WildcardDomain(String),
    Ip(IpAddr),
    Cidr(IpNet),
}

impl RulePattern {
    /// Parse `value` according to `rule_type`
    pub fn compile(rule_type: RuleType, value: &str) -> Result<Self> {
        let value = value.trim();
        match rule_type {
            RuleType::Domain => compile_domain(value),
            RuleType::Ip => value
                .parse::<IpAddr>()
                .map(|ip| RulePattern::Ip(ip.to_canonical()))
                .map_err(|_| SwitcherError::validation(format!("Invalid IP address: {}", value))),
            RuleType::Cidr => value
                .parse::<IpNet>()
                .map(|net| RulePattern::Cidr(canonical_net(net.trunc())))
                .map_err(|_| SwitcherError::validation(format!("Invalid CIDR block: {}", value))),
        }
    }

    pub fn for_rule(rule: &ProxyRule) -> Result<Self> {
        Self::compile(rule.rule_type, &rule.value)
    }
}

/// Test a compiled rule against a target
pub fn matches(pattern: &RulePattern, target: &RouteTarget) -> bool {
    match pattern {
        RulePattern::Domain(name) => target.host == *name,
        RulePattern::WildcardDomain(suffix) => target
            .host
            .strip_suffix(suffix.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|label| !label.is_empty()),
        RulePattern::Ip(ip) => target.ip == Some(*ip),
        RulePattern::Cidr(net) => target.ip.is_some_and(|ip| net.contains(&ip)),
    }
}

/// Convenience form of [`matches`] that compiles the rule first.
///
/// Rules that fail to compile never match.
pub fn rule_matches(rule: &ProxyRule, host: &str, ip: Option<IpAddr>) -> bool {
    RulePattern::for_rule(rule)
        .map(|pattern| matches(&pattern, &RouteTarget::new(host, ip)))
        .unwrap_or(false)
}

/// Targets are canonicalized to IPv4 when IPv4-mapped, so a net inside
/// `::ffff:0:0/96` is rewritten to the IPv4 net it covers.
fn canonical_net(net: IpNet) -> IpNet {
    match net {
        IpNet::V6(v6) if v6.prefix_len() >= 96 => v6
            .network()
            .to_ipv4_mapped()
            .and_then(|addr| Ipv4Net::new(addr, v6.prefix_len() - 96).ok())
            .map(IpNet::V4)
            .unwrap_or(net),
        _ => net,
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.');
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.to_ascii_lowercase()
}

fn compile_domain(value: &str) -> Result<RulePattern> {
    let normalized = value.trim_end_matches('.').to_ascii_lowercase();
    let (wildcard, name) = match normalized.strip_prefix("*.") {
        Some(rest) => (true, rest),
        None => (false, normalized.as_str()),
    };

    validate_domain(name).map_err(|reason| {
        SwitcherError::validation(format!("Invalid domain pattern {}: {}", value, reason))
    })?;

    Ok(if wildcard {
        RulePattern::WildcardDomain(name.to_string())
    } else {
        RulePattern::Domain(name.to_string())
    })
}

fn validate_domain(name: &str) -> std::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty name");
    }
    if name.len() > MAX_DOMAIN_LEN {
        return Err("name too long");
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err("empty label");
        }
        if label.len() > MAX_LABEL_LEN {
            return Err("label too long");
        }
        if label.contains('*') {
            return Err("wildcard only allowed as the leading label");
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("invalid character");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str) -> RouteTarget {
        RouteTarget::new(host, None)
    }

    fn resolved(host: &str, ip: &str) -> RouteTarget {
        RouteTarget::new(host, Some(ip.parse().unwrap()))
    }

    #[test]
    fn test_exact_domain_is_case_insensitive() {
        let pattern = RulePattern::compile(RuleType::Domain, "Example.COM").unwrap();
        assert!(matches(&pattern, &target("example.com")));
        assert!(matches(&pattern, &target("EXAMPLE.com.")));
        assert!(!matches(&pattern, &target("api.example.com")));
        assert!(!matches(&pattern, &target("notexample.com")));
    }

    #[test]
    fn test_wildcard_requires_subdomain_label() {
        let pattern = RulePattern::compile(RuleType::Domain, "*.example.com").unwrap();
        assert!(matches(&pattern, &target("api.example.com")));
        assert!(matches(&pattern, &target("a.b.example.com")));
        assert!(!matches(&pattern, &target("example.com")));
        assert!(!matches(&pattern, &target("badexample.com")));
        assert!(!matches(&pattern, &target(".example.com")));
    }

    #[test]
    fn test_domain_validation() {
        assert!(RulePattern::compile(RuleType::Domain, "").is_err());
        assert!(RulePattern::compile(RuleType::Domain, "*").is_err());
        assert!(RulePattern::compile(RuleType::Domain, "api.*.example.com").is_err());
        assert!(RulePattern::compile(RuleType::Domain, "exa mple.com").is_err());
        assert!(RulePattern::compile(RuleType::Domain, "a..b").is_err());
        assert!(RulePattern::compile(RuleType::Domain, &"a".repeat(64)).is_err());
        assert!(RulePattern::compile(RuleType::Domain, "localhost").is_ok());
        assert!(RulePattern::compile(RuleType::Domain, "_srv.my-host.example").is_ok());
    }

    #[test]
    fn test_ip_rule_needs_resolved_ip() {
        let pattern = RulePattern::compile(RuleType::Ip, "93.184.216.34").unwrap();
        assert!(matches(&pattern, &resolved("example.com", "93.184.216.34")));
        assert!(!matches(&pattern, &resolved("example.com", "93.184.216.35")));
        assert!(!matches(&pattern, &target("example.com")));
    }

    #[test]
    fn test_ip_literal_host_is_used_as_target_ip() {
        let pattern = RulePattern::compile(RuleType::Ip, "10.1.2.3").unwrap();
        assert!(matches(&pattern, &target("10.1.2.3")));

        let pattern = RulePattern::compile(RuleType::Ip, "2001:db8::1").unwrap();
        assert!(matches(&pattern, &target("[2001:db8::1]")));
    }

    #[test]
    fn test_cidr_containment() {
        let pattern = RulePattern::compile(RuleType::Cidr, "192.168.1.0/24").unwrap();
        assert!(matches(&pattern, &target("192.168.1.37")));
        assert!(matches(&pattern, &target("192.168.1.0")));
        assert!(matches(&pattern, &target("192.168.1.255")));
        assert!(!matches(&pattern, &target("192.168.2.1")));
        assert!(!matches(&pattern, &target("example.com")));
    }

    #[test]
    fn test_cidr_host_bits_are_masked() {
        let pattern = RulePattern::compile(RuleType::Cidr, "10.20.30.40/16").unwrap();
        assert_eq!(pattern, RulePattern::Cidr("10.20.0.0/16".parse().unwrap()));
        assert!(matches(&pattern, &target("10.20.255.1")));
    }

    #[test]
    fn test_cidr_ipv6_and_mapped_addresses() {
        let pattern = RulePattern::compile(RuleType::Cidr, "2001:db8::/32").unwrap();
        assert!(matches(&pattern, &target("2001:db8:abcd::1")));
        assert!(!matches(&pattern, &target("2001:db9::1")));

        let v4 = RulePattern::compile(RuleType::Cidr, "10.0.0.0/8").unwrap();
        assert!(matches(&v4, &resolved("internal", "::ffff:10.9.8.7")));
        assert!(!matches(&v4, &target("2001:db8::1")));
    }

    #[test]
    fn test_mapped_ipv6_cidr_matches_ipv4_targets() {
        let pattern = RulePattern::compile(RuleType::Cidr, "::ffff:10.0.0.0/104").unwrap();
        assert_eq!(pattern, RulePattern::Cidr("10.0.0.0/8".parse().unwrap()));
        assert!(matches(&pattern, &target("10.1.2.3")));
        assert!(matches(&pattern, &resolved("internal", "::ffff:10.9.8.7")));
        assert!(!matches(&pattern, &target("11.0.0.1")));

        let wide = RulePattern::compile(RuleType::Cidr, "2001:db8::/32").unwrap();
        assert!(matches!(wide, RulePattern::Cidr(IpNet::V6(_))));
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(RulePattern::compile(RuleType::Cidr, "192.168.1.0").is_err());
        assert!(RulePattern::compile(RuleType::Cidr, "192.168.1.0/33").is_err());
        assert!(RulePattern::compile(RuleType::Ip, "300.1.1.1").is_err());
        assert!(RulePattern::compile(RuleType::Ip, "example.com").is_err());
    }

    #[test]
    fn test_rule_matches_convenience() {
        let rule = ProxyRule {
            id: "r1".into(),
            name: "lan".into(),
            rule_type: RuleType::Cidr,
            value: "192.168.0.0/16".into(),
            action: crate::models::RuleAction::Allow,
            priority: 1,
        };
        assert!(rule_matches(&rule, "printer.lan", Some("192.168.4.4".parse().unwrap())));
        assert!(!rule_matches(&rule, "printer.lan", None));
    }
}
