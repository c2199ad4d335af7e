use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitcherError};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "connecting" => Some(ConnectionStatus::Connecting),
            "connected" => Some(ConnectionStatus::Connected),
            "disconnected" => Some(ConnectionStatus::Disconnected),
            "error" => Some(ConnectionStatus::Error),
            _ => None,
        }
    }

    /// Transition table. `Connected -> Connected` is the in-place refresh.
    pub fn can_transition_to(&self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Connecting, Connected)
                | (Connecting, Error)
                | (Connecting, Disconnected)
                | (Connected, Connected)
                | (Connected, Error)
                | (Connected, Disconnected)
                | (Error, Connecting)
                | (Disconnected, Connecting)
        )
    }

    /// Still owned by the transport layer
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a connection is headed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Tracked connection record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub target: ConnectionTarget,
    /// None for direct connections
    pub proxy_id: Option<String>,
    pub matched_rule: Option<String>,
    pub status: ConnectionStatus,
    /// Only meaningful while connected
    pub latency_ms: Option<u32>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub opened_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// The proxy config behind this connection was deleted
    pub needs_reconciliation: bool,
}

/// State report from the transport layer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateReport {
    pub status: String,
    #[serde(default)]
    pub latency_ms: Option<u32>,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
}

impl StateReport {
    pub fn new(status: ConnectionStatus) -> Self {
        Self {
            status: status.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency_ms: u32) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_bytes(mut self, sent: u64, received: u64) -> Self {
        self.bytes_sent = sent;
        self.bytes_received = received;
        self
    }

    pub fn parsed_status(&self) -> Result<ConnectionStatus> {
        ConnectionStatus::from_str(&self.status).ok_or_else(|| {
            SwitcherError::validation(format!("Unknown connection status: {}", self.status))
        })
    }
}

/// Aggregate connection statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub total: usize,
    pub connecting: usize,
    pub connected: usize,
    pub disconnected: usize,
    pub error: usize,
    /// Mean over connected records with a reported latency; 0.0 when none
    pub mean_latency_ms: f64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// History retention bound for `evict`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retention {
    /// Drop historical records idle for longer than this
    pub max_age: Option<Duration>,
    /// Keep at most this many historical records, newest first
    pub max_records: Option<usize>,
}

impl Retention {
    pub fn new(max_age: Option<Duration>, max_records: Option<usize>) -> Self {
        Self {
            max_age,
            max_records,
        }
    }
}

/// Eviction request as submitted over the command surface
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvictRequest {
    #[serde(default)]
    pub max_age_secs: Option<u64>,
    #[serde(default)]
    pub max_records: Option<usize>,
}

impl From<EvictRequest> for Retention {
    fn from(req: EvictRequest) -> Self {
        Retention {
            max_age: req.max_age_secs.map(Duration::from_secs),
            max_records: req.max_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionStatus::*;

    #[test]
    fn test_transition_table() {
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Error));
        assert!(Connected.can_transition_to(Error));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Error.can_transition_to(Connecting));
        assert!(Disconnected.can_transition_to(Connecting));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Error.can_transition_to(Connected));
        assert!(!Connecting.can_transition_to(Connecting));
        assert!(!Error.can_transition_to(Error));
        assert!(!Disconnected.can_transition_to(Disconnected));
    }

    #[test]
    fn test_connected_refresh_in_place() {
        assert!(Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(ConnectionStatus::from_str("CONNECTED"), Some(Connected));
        assert_eq!(ConnectionStatus::from_str("closed"), None);
        assert!(Connecting.is_live());
        assert!(!Error.is_live());
    }

    #[test]
    fn test_target_display() {
        let target = ConnectionTarget {
            host: "example.com".into(),
            port: 443,
            ip: None,
        };
        assert_eq!(target.to_string(), "example.com:443");

        let target = ConnectionTarget {
            host: "2001:db8::1".into(),
            port: 80,
            ip: None,
        };
        assert_eq!(target.to_string(), "[2001:db8::1]:80");
    }

    #[test]
    fn test_evict_request_into_retention() {
        let retention: Retention = EvictRequest {
            max_age_secs: Some(60),
            max_records: None,
        }
        .into();
        assert_eq!(retention.max_age, Some(Duration::from_secs(60)));
        assert_eq!(retention.max_records, None);
    }
}
