//! Rule evaluation and route selection
//!
//! This module provides:
//! - An ordered rule table with copy-on-write snapshots
//! - Pure matchers for domain, IP and CIDR rules
//! - A registry of upstream proxy configurations
//! - The routing engine that turns a target into a verdict

pub mod engine;
pub mod matcher;
pub mod registry;
pub mod rule_table;

pub use engine::RoutingEngine;
pub use matcher::{matches, rule_matches, RouteTarget, RulePattern};
pub use registry::ProxyRegistry;
pub use rule_table::{RuleEntry, RuleSnapshot, RuleTable};
