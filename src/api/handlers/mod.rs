//! API request handlers

pub mod connection;
pub mod health;
pub mod proxy;
pub mod route;
pub mod rule;
