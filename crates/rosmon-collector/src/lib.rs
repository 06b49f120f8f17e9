//! Metric collection framework for the rosmon exporter.
//!
//! Each [`Collector`] declares its metric descriptors once and, on every
//! scrape cycle, queries a device through the shared protocol client and
//! emits [`Sample`]s into the cycle's [`MetricSink`]. The
//! [`registry::CollectorRegistry`] drives all collectors across all devices.

pub mod descriptor;
pub mod health;
pub mod registry;


use anyhow::Result;
use async_trait::async_trait;
use rosmon_api::Client;
use rosmon_common::types::{Device, MetricDesc, Sample};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

pub use descriptor::DescriptorTable;
pub use health::HealthCollector;
pub use registry::{CollectorRegistry, Connector, ScrapeOutcome, ScrapeReport};

/// Destination for emitted samples. Shared by every collector and device of a
/// scrape cycle, so implementations must accept concurrent sends.
pub trait MetricSink: Send + Sync {
    fn emit(&self, sample: Sample);
}

/// Per-cycle inputs of [`Collector::collect`]. Everything is borrowed, so a
/// collector cannot hold on to any of it past the call.
pub struct CollectorContext<'a> {
    pub device: &'a Device,
    pub client: &'a dyn Client,
    pub sink: &'a dyn MetricSink,
}

/// A device telemetry collector.
///
/// Implementations are registered in the [`CollectorRegistry`] and called
/// once per device per scrape cycle, possibly from several tasks at once.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short collector name (e.g. `"health"`), used for logging and the
    /// scrape outcome metrics.
    fn name(&self) -> &str;

    /// Every descriptor this collector can emit, each exactly once. Never
    /// contacts a device.
    fn describe(&self) -> Vec<Arc<MetricDesc>>;

    /// Fetches current values from `ctx.device` and emits them to `ctx.sink`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the protocol request itself fails; problems
    /// with individual values are logged and skipped.
    async fn collect(&self, ctx: &CollectorContext<'_>) -> Result<()>;
}

/// Sink backed by an unbounded tokio channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<Sample>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<Sample>) -> Self {
        Self { tx }
    }
}

impl MetricSink for ChannelSink {
    fn emit(&self, sample: Sample) {
        if let Err(e) = self.tx.send(sample) {
            tracing::debug!(metric = %e.0.name(), "Sample dropped, receiver closed");
        }
    }
}

/// Sink that keeps samples in memory.
#[derive(Default)]
pub struct VecSink {
    samples: Mutex<Vec<Sample>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything emitted so far.
    pub fn take(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.samples.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl MetricSink for VecSink {
    fn emit(&self, sample: Sample) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample);
    }
}
