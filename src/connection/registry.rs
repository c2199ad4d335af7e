//! Connection lifecycle registry
//!
//! Records are indexed in a `DashMap` and each one sits behind its own
//! mutex: reports for different ids never contend, reports for the same id
//! are applied one at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SwitcherError};
use crate::models::{
    Connection, ConnectionStats, ConnectionStatus, ConnectionTarget, Retention, StateReport,
    Verdict,
};

type Record = Arc<Mutex<Connection>>;

pub struct ConnectionRegistry {
    records: DashMap<String, Record>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Create a `connecting` record for an allow verdict
    pub fn open(&self, verdict: &Verdict, target: ConnectionTarget) -> Result<String> {
        if !verdict.is_allowed() {
            debug!(dest = %target, rule = ?verdict.matched_rule, "Refusing denied connection");
            return Err(SwitcherError::Denied {
                target: target.to_string(),
                rule: verdict.matched_rule.clone(),
            });
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let connection = Connection {
            id: id.clone(),
            target,
            proxy_id: verdict.selected_proxy.clone(),
            matched_rule: verdict.matched_rule.clone(),
            status: ConnectionStatus::Connecting,
            latency_ms: None,
            bytes_sent: 0,
            bytes_received: 0,
            opened_at: now,
            last_activity: now,
            needs_reconciliation: false,
        };

        info!(
            id = %id,
            dest = %connection.target,
            proxy = ?connection.proxy_id,
            "Opened connection"
        );
        self.records
            .insert(id.clone(), Arc::new(Mutex::new(connection)));
        Ok(id)
    }

    /// Route an `error`/`disconnected` record again with a fresh verdict
    pub fn reopen(&self, id: &str, verdict: &Verdict) -> Result<Connection> {
        let record = self.record(id)?;
        let mut conn = record.lock();

        if !verdict.is_allowed() {
            return Err(SwitcherError::Denied {
                target: conn.target.to_string(),
                rule: verdict.matched_rule.clone(),
            });
        }
        ensure_transition(&conn, ConnectionStatus::Connecting)?;

        conn.status = ConnectionStatus::Connecting;
        conn.proxy_id = verdict.selected_proxy.clone();
        conn.matched_rule = verdict.matched_rule.clone();
        conn.latency_ms = None;
        conn.needs_reconciliation = false;
        conn.last_activity = Utc::now();

        info!(id = %id, proxy = ?conn.proxy_id, "Reopened connection");
        Ok(conn.clone())
    }

    /// Apply a transport-layer state report
    pub fn report_state(&self, id: &str, report: &StateReport) -> Result<Connection> {
        let next = report.parsed_status()?;
        let record = self.record(id)?;
        let mut conn = record.lock();

        ensure_transition(&conn, next)?;

        // counters only move while there is (or just was) a live session
        if matches!(conn.status, ConnectionStatus::Connected) || next == ConnectionStatus::Connected {
            conn.bytes_sent = conn.bytes_sent.saturating_add(report.bytes_sent);
            conn.bytes_received = conn.bytes_received.saturating_add(report.bytes_received);
        }

        if next == ConnectionStatus::Connected {
            if let Some(latency) = report.latency_ms {
                conn.latency_ms = Some(latency);
            }
        } else {
            conn.latency_ms = None;
        }

        if conn.status != next {
            debug!(id = %id, from = %conn.status, to = %next, "Connection state changed");
        }
        conn.status = next;
        conn.last_activity = Utc::now();

        Ok(conn.clone())
    }

    pub fn get(&self, id: &str) -> Option<Connection> {
        self.records.get(id).map(|r| r.value().lock().clone())
    }

    /// All records, oldest first
    pub fn list(&self) -> Vec<Connection> {
        let mut all: Vec<Connection> = self
            .records
            .iter()
            .map(|r| r.value().lock().clone())
            .collect();
        all.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn stats(&self) -> ConnectionStats {
        let mut stats = ConnectionStats::default();
        let mut latency_sum = 0u64;
        let mut latency_count = 0u64;

        for record in self.records.iter() {
            let conn = record.value().lock();
            stats.total += 1;
            stats.bytes_sent = stats.bytes_sent.saturating_add(conn.bytes_sent);
            stats.bytes_received = stats.bytes_received.saturating_add(conn.bytes_received);
            match conn.status {
                ConnectionStatus::Connecting => stats.connecting += 1,
                ConnectionStatus::Connected => {
                    stats.connected += 1;
                    if let Some(latency) = conn.latency_ms {
                        latency_sum += u64::from(latency);
                        latency_count += 1;
                    }
                }
                ConnectionStatus::Disconnected => stats.disconnected += 1,
                ConnectionStatus::Error => stats.error += 1,
            }
        }

        stats.mean_latency_ms = if latency_count == 0 {
            0.0
        } else {
            latency_sum as f64 / latency_count as f64
        };
        stats
    }

    /// Flag live connections routed through a deleted proxy config.
    ///
    /// Returns the flagged ids; tearing them down is the transport's job.
    pub fn flag_proxy_removed(&self, proxy_id: &str) -> Vec<String> {
        let mut flagged = Vec::new();
        for record in self.records.iter() {
            let mut conn = record.value().lock();
            if conn.status.is_live() && conn.proxy_id.as_deref() == Some(proxy_id) {
                conn.needs_reconciliation = true;
                flagged.push(conn.id.clone());
            }
        }

        if !flagged.is_empty() {
            warn!(
                proxy_id = %proxy_id,
                count = flagged.len(),
                "Live connections reference a deleted proxy config"
            );
        }
        flagged
    }

    /// Drop historical records outside the retention bound
    pub fn evict(&self, retention: &Retention) -> usize {
        self.evict_at(retention, Utc::now())
    }

    /// Only `disconnected` and `error` records are eligible; the age bound
    /// is measured from `last_activity`, and the count bound keeps the most
    /// recently active ones.
    pub fn evict_at(&self, retention: &Retention, now: DateTime<Utc>) -> usize {
        let mut historical: Vec<(String, DateTime<Utc>)> = self
            .records
            .iter()
            .filter_map(|r| {
                let conn = r.value().lock();
                (!conn.status.is_live()).then(|| (conn.id.clone(), conn.last_activity))
            })
            .collect();
        // newest first
        historical.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let cutoff = retention
            .max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .map(|age| now - age);

        let mut evicted = 0;
        for (rank, (id, last_activity)) in historical.into_iter().enumerate() {
            let too_old = cutoff.is_some_and(|cutoff| last_activity < cutoff);
            let over_count = retention.max_records.is_some_and(|max| rank >= max);
            if !(too_old || over_count) {
                continue;
            }
            // a concurrent reopen may have revived it
            let removed = self
                .records
                .remove_if(&id, |_, record| !record.lock().status.is_live());
            if removed.is_some() {
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, remaining = self.records.len(), "Evicted connection records");
        }
        evicted
    }

    fn record(&self, id: &str) -> Result<Record> {
        self.records
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| SwitcherError::connection_not_found(id))
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_transition(conn: &Connection, next: ConnectionStatus) -> Result<()> {
    if conn.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(SwitcherError::InvalidTransition {
            id: conn.id.clone(),
            from: conn.status,
            to: next,
        })
    }
}
