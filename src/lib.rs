//! Proxy Switcher - rule-based route selection
//!
//! Decides, per outbound connection, whether it may proceed and through
//! which upstream proxy, and tracks the resulting connections.
//!
//! ## Features
//!
//! - Domain (exact and `*.` wildcard), IP and CIDR rules evaluated by priority
//! - HTTP, HTTPS and SOCKS5 upstream proxy configs
//! - Allow/deny default policy for unmatched targets
//! - Connection lifecycle tracking with retention-based eviction
//! - JSON file persistence of configs and rules

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod repository;
pub mod routing;
pub mod services;

pub use config::Config;
pub use error::{Result, SwitcherError};
