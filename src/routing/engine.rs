//! Route selection
//!
//! Evaluates the rule table in (priority, insertion) order; the first
//! matching rule decides. When nothing matches the default policy applies,
//! which is allow-direct unless the deployment opts into deny-by-default.

use std::net::IpAddr;

use tracing::{debug, info};

use super::matcher::RouteTarget;
use super::registry::ProxyRegistry;
use super::rule_table::RuleTable;
use crate::error::Result;
use crate::models::{DefaultPolicy, ProxyProtocol, RuleAction, StoredState, Verdict};

/// Central decision point composing rules and proxy configs
pub struct RoutingEngine {
    rules: RuleTable,
    proxies: ProxyRegistry,
    default_policy: DefaultPolicy,
}

impl RoutingEngine {
    pub fn new(default_policy: DefaultPolicy) -> Self {
        Self {
            rules: RuleTable::new(),
            proxies: ProxyRegistry::new(),
            default_policy,
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn proxies(&self) -> &ProxyRegistry {
        &self.proxies
    }

    pub fn default_policy(&self) -> DefaultPolicy {
        self.default_policy
    }

    /// Decide how a connection to `host` should be handled.
    ///
    /// Reads one rule snapshot and never mutates state, so repeated calls
    /// with the same tables and inputs return the same verdict.
    pub fn decide(
        &self,
        host: &str,
        ip: Option<IpAddr>,
        preferred_protocol: Option<ProxyProtocol>,
    ) -> Verdict {
        self.decide_target(&RouteTarget::new(host, ip), preferred_protocol)
    }

    pub fn decide_target(
        &self,
        target: &RouteTarget,
        preferred_protocol: Option<ProxyProtocol>,
    ) -> Verdict {
        let snapshot = self.rules.snapshot();

        let verdict = match snapshot.first_match(target) {
            Some(rule) if rule.action == RuleAction::Deny => Verdict::deny(Some(rule.id.clone())),
            Some(rule) => Verdict::allow(
                Some(rule.id.clone()),
                self.select_proxy(preferred_protocol),
            ),
            None => match self.default_policy {
                DefaultPolicy::Allow => Verdict::allow(None, None),
                DefaultPolicy::Deny => Verdict::deny(None),
            },
        };

        debug!(
            host = %target.host(),
            ip = ?target.ip(),
            outcome = %verdict.outcome,
            matched_rule = ?verdict.matched_rule,
            selected_proxy = ?verdict.selected_proxy,
            "Routing decision"
        );
        verdict
    }

    /// A preferred protocol is strict: with no enabled config of that
    /// protocol the connection goes direct.
    fn select_proxy(&self, preferred_protocol: Option<ProxyProtocol>) -> Option<String> {
        self.proxies
            .first_enabled(preferred_protocol)
            .map(|config| config.id)
    }

    /// Configs and rules in a form suitable for persistence.
    ///
    /// Rules are exported in insertion order so `restore` rebuilds the same
    /// tie-break between equal priorities.
    pub fn export_state(&self) -> StoredState {
        StoredState {
            proxies: self.proxies.list().as_ref().clone(),
            rules: self.rules.snapshot().rules_in_insertion_order(),
        }
    }

    /// Replace configs and rules from a persisted state.
    ///
    /// Both halves are validated before either is published.
    pub fn restore(&self, state: StoredState) -> Result<()> {
        let staged_rules = RuleTable::new();
        staged_rules.replace_all(state.rules.clone())?;
        let staged_proxies = ProxyRegistry::new();
        staged_proxies.replace_all(state.proxies.clone())?;

        self.proxies.replace_all(state.proxies)?;
        self.rules.replace_all(state.rules)?;

        info!(
            proxies = self.proxies.len(),
            rules = self.rules.len(),
            "Restored routing state"
        );
        Ok(())
    }
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new(DefaultPolicy::default())
    }
}
