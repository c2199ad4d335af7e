//! Background services

pub mod connection_eviction;

pub use connection_eviction::{
    ConnectionEvictionConfig, ConnectionEvictionHandle, ConnectionEvictionService,
};
