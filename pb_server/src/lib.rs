//! HTTP front end for the pet battle engine.
//!
//! Exposed as a library so integration tests can build the router without
//! binding a socket.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
