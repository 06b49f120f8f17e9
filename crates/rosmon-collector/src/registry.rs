use crate::{ChannelSink, Collector, CollectorContext};
use anyhow::Result;
use async_trait::async_trait;
use rosmon_api::{ApiError, Client};
use rosmon_common::types::{Device, MetricDesc, Sample};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;

/// Opens an authenticated protocol session to a device.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, device: &Device) -> Result<Box<dyn Client>>;
}

/// Result of running one collector against one device.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOutcome {
    pub device: String,
    pub collector: String,
    pub success: bool,
    pub duration: Duration,
}

/// Everything one scrape cycle produced.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub samples: Vec<Sample>,
    pub outcomes: Vec<ScrapeOutcome>,
}

/// Holds the active collectors and runs them across devices.
///
/// Devices are scraped concurrently (bounded by `concurrency`), each on its
/// own connection; the collectors of one device run one after another on
/// that device's connection.
pub struct CollectorRegistry {
    collectors: Vec<Arc<dyn Collector>>,
    connector: Arc<dyn Connector>,
    concurrency: usize,
    timeout: Duration,
}

impl CollectorRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            collectors: Vec::new(),
            connector,
            concurrency: 8,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Deadline for connecting to a device and for each collect call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn collector_names(&self) -> Vec<String> {
        self.collectors.iter().map(|c| c.name().to_string()).collect()
    }

    /// Descriptors of every registered collector.
    pub fn describe(&self) -> Vec<Arc<MetricDesc>> {
        self.collectors.iter().flat_map(|c| c.describe()).collect()
    }

    /// Run one scrape cycle over `devices`.
    pub async fn scrape(&self, devices: &[Device]) -> ScrapeReport {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(devices.len());

        for device in devices {
            let device = device.clone();
            let collectors = self.collectors.clone();
            let connector = Arc::clone(&self.connector);
            let sink = ChannelSink::new(tx.clone());
            let sem = Arc::clone(&semaphore);
            let timeout_after = self.timeout;

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                scrape_device(&device, &collectors, connector.as_ref(), &sink, timeout_after).await
            }));
        }
        drop(tx);

        let mut report = ScrapeReport::default();
        for task in tasks {
            match task.await {
                Ok(outcomes) => report.outcomes.extend(outcomes),
                Err(e) => tracing::error!(error = %e, "Device scrape task panicked"),
            }
        }
        while let Some(sample) = rx.recv().await {
            report.samples.push(sample);
        }

        tracing::debug!(
            devices = devices.len(),
            samples = report.samples.len(),
            "Scrape cycle finished"
        );
        report
    }
}

async fn scrape_device(
    device: &Device,
    collectors: &[Arc<dyn Collector>],
    connector: &dyn Connector,
    sink: &ChannelSink,
    timeout_after: Duration,
) -> Vec<ScrapeOutcome> {
    let started = Instant::now();
    let client = match timeout(timeout_after, connector.connect(device)).await {
        Ok(Ok(client)) => client,
        Ok(Err(e)) => {
            tracing::error!(device = %device.name, address = %device.address, error = %e, "Failed to connect to device");
            return failed(device, collectors, started.elapsed());
        }
        Err(_) => {
            tracing::error!(device = %device.name, address = %device.address, "Timed out connecting to device");
            return failed(device, collectors, started.elapsed());
        }
    };

    let ctx = CollectorContext {
        device,
        client: client.as_ref(),
        sink,
    };

    let mut outcomes = Vec::with_capacity(collectors.len());
    for (i, collector) in collectors.iter().enumerate() {
        let started = Instant::now();
        let (success, session_broken) = match timeout(timeout_after, collector.collect(&ctx)).await {
            Ok(Ok(())) => (true, false),
            Ok(Err(e)) => {
                tracing::warn!(device = %device.name, collector = collector.name(), error = %e, "Collection failed");
                let timed_out = matches!(e.downcast_ref::<ApiError>(), Some(ApiError::Timeout(_)));
                (false, timed_out)
            }
            Err(_) => {
                tracing::warn!(device = %device.name, collector = collector.name(), "Collection timed out");
                (false, true)
            }
        };
        outcomes.push(ScrapeOutcome {
            device: device.name.clone(),
            collector: collector.name().to_string(),
            success,
            duration: started.elapsed(),
        });

        // An interrupted exchange leaves unread reply words on the connection.
        if session_broken {
            let remaining = &collectors[i + 1..];
            if !remaining.is_empty() {
                tracing::warn!(
                    device = %device.name,
                    skipped = remaining.len(),
                    "Dropping connection after timeout, skipping remaining collectors"
                );
                outcomes.extend(failed(device, remaining, Duration::ZERO));
            }
            break;
        }
    }
    outcomes
}

fn failed(device: &Device, collectors: &[Arc<dyn Collector>], duration: Duration) -> Vec<ScrapeOutcome> {
    collectors
        .iter()
        .map(|c| ScrapeOutcome {
            device: device.name.clone(),
            collector: c.name().to_string(),
            success: false,
            duration,
        })
        .collect()
}
