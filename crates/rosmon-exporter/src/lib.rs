//! Prometheus exporter for RouterOS hardware health.
//!
//! Loads the device inventory from TOML, connects to each device over the
//! RouterOS API on every scrape, and serves the collected samples in the
//! Prometheus text format at `/metrics`.

pub mod app;
pub mod config;
pub mod connector;
pub mod exposition;
