//! Simulated players for load-testing a pet battle server.

pub mod api_client;
pub mod player;
