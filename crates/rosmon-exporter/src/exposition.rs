use anyhow::Result;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use rosmon_collector::ScrapeReport;
use rosmon_common::types::{MetricDesc, ValueType, NAMESPACE};
use std::collections::HashMap;
use std::sync::Arc;

const SCRAPE_LABELS: [&str; 2] = ["device", "collector"];

/// Render one scrape cycle in the Prometheus text format.
///
/// `descs` is the registry's full descriptor set; samples referring to any
/// other metric are dropped with a warning.
pub fn render(descs: &[Arc<MetricDesc>], report: &ScrapeReport) -> Result<String> {
    let registry = Registry::new();

    let mut gauges: HashMap<&str, GaugeVec> = HashMap::with_capacity(descs.len());
    for desc in descs {
        if gauges.contains_key(desc.name.as_str()) {
            continue;
        }
        let labels: Vec<&str> = desc.label_names.iter().map(String::as_str).collect();
        let gauge = GaugeVec::new(Opts::new(desc.name.as_str(), desc.help.as_str()), &labels)?;
        registry.register(Box::new(gauge.clone()))?;
        gauges.insert(desc.name.as_str(), gauge);
    }

    for sample in &report.samples {
        let Some(gauge) = gauges.get(sample.name()) else {
            tracing::warn!(metric = %sample.name(), "Dropping sample for undescribed metric");
            continue;
        };
        let values: Vec<&str> = sample.label_values.iter().map(String::as_str).collect();
        match sample.value_type {
            ValueType::Gauge => match gauge.get_metric_with_label_values(&values) {
                Ok(g) => g.set(sample.value),
                Err(e) => {
                    tracing::warn!(metric = %sample.name(), error = %e, "Dropping sample with mismatched labels");
                }
            },
        }
    }

    let success = GaugeVec::new(
        Opts::new(
            format!("{NAMESPACE}_scrape_collector_success"),
            "Whether a collector succeeded for a device (1) or not (0)",
        ),
        &SCRAPE_LABELS,
    )?;
    let duration = GaugeVec::new(
        Opts::new(
            format!("{NAMESPACE}_scrape_collector_duration_seconds"),
            "Time a collector took for a device, in seconds",
        ),
        &SCRAPE_LABELS,
    )?;
    registry.register(Box::new(success.clone()))?;
    registry.register(Box::new(duration.clone()))?;

    for outcome in &report.outcomes {
        let labels = [outcome.device.as_str(), outcome.collector.as_str()];
        success
            .with_label_values(&labels)
            .set(if outcome.success { 1.0 } else { 0.0 });
        duration
            .with_label_values(&labels)
            .set(outcome.duration.as_secs_f64());
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
