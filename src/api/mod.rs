//! API server implementation
//!
//! REST endpoints for proxy configs, rules, routing decisions and the
//! connection registry.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
