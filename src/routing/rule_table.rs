//! Ordered rule storage
//!
//! Readers load an immutable [`RuleSnapshot`] through `ArcSwap` and never
//! block. Writers serialize on a mutex, build a fresh snapshot and swap it
//! in, so a reader sees either the old table or the new one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::matcher::{self, RulePattern, RouteTarget};
use crate::error::{Result, SwitcherError};
use crate::models::ProxyRule;

/// A rule plus its compiled pattern and insertion sequence
#[derive(Debug, Clone)]
pub struct RuleEntry {
    seq: u64,
    rule: ProxyRule,
    pattern: RulePattern,
}

impl RuleEntry {
    pub fn rule(&self) -> &ProxyRule {
        &self.rule
    }

    pub fn matches(&self, target: &RouteTarget) -> bool {
        matcher::matches(&self.pattern, target)
    }
}

/// Immutable view sorted by (priority, insertion order)
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    entries: Vec<RuleEntry>,
    next_seq: u64,
}

impl RuleSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&ProxyRule> {
        self.position(id).map(|idx| &self.entries[idx].rule)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> Vec<ProxyRule> {
        self.entries.iter().map(|e| e.rule.clone()).collect()
    }

    /// Rules in insertion order.
    ///
    /// Replaying these through `replace_all` rebuilds the same tie-break
    /// sequence, which evaluation order alone cannot.
    pub fn rules_in_insertion_order(&self) -> Vec<ProxyRule> {
        let mut entries: Vec<&RuleEntry> = self.entries.iter().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.rule.clone()).collect()
    }

    /// First rule in evaluation order that matches `target`
    pub fn first_match(&self, target: &RouteTarget) -> Option<&ProxyRule> {
        self.entries
            .iter()
            .find(|entry| entry.matches(target))
            .map(|entry| &entry.rule)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.rule.id == id)
    }

    fn sort(&mut self) {
        self.entries
            .sort_by_key(|entry| (entry.rule.priority, entry.seq));
    }
}

/// Ordered, concurrently readable rule table
pub struct RuleTable {
    current: ArcSwap<RuleSnapshot>,
    write_lock: Mutex<()>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSnapshot::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Consistent ordered view for sequential evaluation
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }

    pub fn get(&self, id: &str) -> Option<ProxyRule> {
        self.current.load().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Insert a new rule, or replace the one with the same id.
    ///
    /// A replaced rule keeps its original insertion sequence.
    pub fn upsert(&self, rule: ProxyRule) -> Result<ProxyRule> {
        self.write(|snapshot| {
            let entry = compile(rule)?;
            Ok(put(snapshot, entry))
        })
    }

    /// Insert a rule whose id is not yet present
    pub fn insert(&self, rule: ProxyRule) -> Result<ProxyRule> {
        self.write(|snapshot| {
            if snapshot.position(&rule.id).is_some() {
                return Err(SwitcherError::validation(format!(
                    "Proxy rule already exists: {}",
                    rule.id
                )));
            }
            let entry = compile(rule)?;
            Ok(put(snapshot, entry))
        })
    }

    /// Replace an existing rule
    pub fn update(&self, rule: ProxyRule) -> Result<ProxyRule> {
        self.write(|snapshot| {
            if snapshot.position(&rule.id).is_none() {
                return Err(SwitcherError::rule_not_found(rule.id));
            }
            let entry = compile(rule)?;
            Ok(put(snapshot, entry))
        })
    }

    /// Change only the priority of a rule
    pub fn set_priority(&self, id: &str, priority: u32) -> Result<ProxyRule> {
        self.write(|snapshot| {
            let idx = snapshot
                .position(id)
                .ok_or_else(|| SwitcherError::rule_not_found(id))?;
            let mut entry = snapshot.entries[idx].clone();
            entry.rule.priority = priority;
            validate_priority(&entry.rule)?;
            Ok(put(snapshot, entry))
        })
    }

    pub fn remove(&self, id: &str) -> Result<ProxyRule> {
        self.write(|snapshot| {
            let idx = snapshot
                .position(id)
                .ok_or_else(|| SwitcherError::rule_not_found(id))?;
            Ok(snapshot.entries.remove(idx).rule)
        })
    }

    /// Replace the whole table; `rules` order becomes insertion order
    pub fn replace_all(&self, rules: Vec<ProxyRule>) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut snapshot = RuleSnapshot::default();
        for rule in rules {
            if snapshot.position(&rule.id).is_some() {
                return Err(SwitcherError::validation(format!(
                    "Duplicate proxy rule id: {}",
                    rule.id
                )));
            }
            let mut entry = compile(rule)?;
            entry.seq = snapshot.next_seq;
            snapshot.next_seq += 1;
            snapshot.entries.push(entry);
        }
        snapshot.sort();

        info!(count = snapshot.len(), "Replaced rule table");
        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// Run `op` against a private copy and publish it only on success
    fn write<T>(&self, op: impl FnOnce(&mut RuleSnapshot) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock();

        let mut next = RuleSnapshot::clone(&self.current.load());
        let out = op(&mut next)?;
        next.sort();

        debug!(count = next.len(), "Publishing rule table");
        self.current.store(Arc::new(next));
        Ok(out)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_priority(rule: &ProxyRule) -> Result<()> {
    if rule.priority == 0 {
        return Err(SwitcherError::validation(
            "Rule priority must be a positive integer",
        ));
    }
    Ok(())
}

fn compile(rule: ProxyRule) -> Result<RuleEntry> {
    if rule.id.trim().is_empty() {
        return Err(SwitcherError::validation("Proxy rule id is required"));
    }
    if rule.name.trim().is_empty() {
        return Err(SwitcherError::validation("Proxy rule name is required"));
    }
    validate_priority(&rule)?;
    let pattern = RulePattern::for_rule(&rule)?;
    Ok(RuleEntry {
        seq: 0,
        rule,
        pattern,
    })
}

/// Place `entry` into the table, keeping the sequence of a replaced rule
fn put(snapshot: &mut RuleSnapshot, mut entry: RuleEntry) -> ProxyRule {
    match snapshot.position(&entry.rule.id) {
        Some(idx) => {
            entry.seq = snapshot.entries[idx].seq;
            snapshot.entries[idx] = entry.clone();
        }
        None => {
            entry.seq = snapshot.next_seq;
            snapshot.next_seq += 1;
            snapshot.entries.push(entry.clone());
        }
    }
    entry.rule
}
