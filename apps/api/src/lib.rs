//! Trajectory API: developer analytics (anomalies, growth forecasts, career
//! progression) and candidate matching, served over HTTP behind a TTL cache.
//!
//! The binary in `main.rs` only wires configuration, logging and the listener;
//! everything else lives here so other services can call the analytics directly.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod errors;
pub mod matching;
pub mod models;
pub mod routes;
pub mod state;
