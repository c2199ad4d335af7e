use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitcherError};

/// What a rule's value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Domain,
    Ip,
    Cidr,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Domain => "domain",
            RuleType::Ip => "ip",
            RuleType::Cidr => "cidr",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "domain" => Some(RuleType::Domain),
            "ip" => Some(RuleType::Ip),
            "cidr" => Some(RuleType::Cidr),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Some(RuleAction::Allow),
            "deny" => Some(RuleAction::Deny),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Routing rule. Lower priority values take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRule {
    pub id: String,
    pub name: String,
    pub rule_type: RuleType,
    pub value: String,
    pub action: RuleAction,
    pub priority: u32,
}

/// Add/update payload for a proxy rule
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyRulePayload {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub rule_type: String,
    pub value: String,
    pub action: String,
    pub priority: i64,
}

impl ProxyRulePayload {
    /// Build a rule with parsed enumerations.
    ///
    /// Value/type consistency is checked when the rule enters the table.
    pub fn into_rule(self, id: String) -> Result<ProxyRule> {
        let rule_type = RuleType::from_str(&self.rule_type).ok_or_else(|| {
            SwitcherError::validation(format!("Unknown rule type: {}", self.rule_type))
        })?;
        let action = RuleAction::from_str(&self.action).ok_or_else(|| {
            SwitcherError::validation(format!("Unknown rule action: {}", self.action))
        })?;

        Ok(ProxyRule {
            id,
            name: self.name.trim().to_string(),
            rule_type,
            value: self.value.trim().to_string(),
            action,
            priority: parse_priority(self.priority)?,
        })
    }
}

/// Priority-only update
#[derive(Debug, Clone, Deserialize)]
pub struct RulePriorityUpdate {
    pub priority: i64,
}

/// Priorities are positive and must fit the stored width
pub fn parse_priority(raw: i64) -> Result<u32> {
    u32::try_from(raw)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| {
            SwitcherError::validation(format!("Rule priority must be a positive integer, got {}", raw))
        })
}
