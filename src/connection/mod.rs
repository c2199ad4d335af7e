//! Connection tracking
//!
//! Records connections admitted by the routing engine and applies the
//! lifecycle reports sent back by the transport layer.

pub mod registry;

pub use registry::ConnectionRegistry;
