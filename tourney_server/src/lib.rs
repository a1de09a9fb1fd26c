//! Server side of the tournament engine: configuration, logging, metrics,
//! and the HTTP/WebSocket surface viewers connect to.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
