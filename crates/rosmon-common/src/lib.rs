//! Shared data model for the rosmon exporter: devices, metric descriptors and
//! the samples collectors emit.

pub mod types;
