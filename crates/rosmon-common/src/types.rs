use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Prefix shared by every metric the exporter publishes.
pub const NAMESPACE: &str = "mikrotik";

/// A monitored RouterOS device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Unique within a scrape run, used as the `name` label.
    pub name: String,
    /// Connection endpoint, used as the `address` label.
    pub address: String,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Label values in the order of [`DEVICE_LABELS`].
    pub fn label_values(&self) -> Vec<String> {
        vec![self.name.clone(), self.address.clone()]
    }
}

/// Label schema attached to every per-device metric.
pub const DEVICE_LABELS: [&str; 2] = ["name", "address"];

/// Kind of a metric sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Gauge,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Gauge => write!(f, "gauge"),
        }
    }
}

/// Immutable identity of a metric, registered before any value exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDesc {
    /// Device property this metric is read from (e.g. `cpu-temperature`).
    pub property: String,
    /// Fully qualified metric name.
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
}

impl MetricDesc {
    pub fn new(
        subsystem: &str,
        property: &str,
        help: &str,
        label_names: &[&str],
    ) -> Self {
        Self {
            property: property.to_string(),
            name: metric_name(subsystem, property),
            help: help.to_string(),
            label_names: label_names.iter().map(|l| (*l).to_string()).collect(),
        }
    }
}

/// Build a fully qualified metric name from a subsystem and a device
/// property, replacing characters Prometheus does not accept.
///
/// # Examples
///
/// ```
/// use rosmon_common::types::metric_name;
///
/// assert_eq!(metric_name("health", "cpu-temperature"), "mikrotik_health_cpu_temperature");
/// assert_eq!(metric_name("health", "fan1-speed"), "mikrotik_health_fan1_speed");
/// ```
pub fn metric_name(subsystem: &str, property: &str) -> String {
    let cleaned: String = property
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{NAMESPACE}_{subsystem}_{cleaned}")
}

/// One value emitted by a collector during a scrape cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: Arc<MetricDesc>,
    pub value_type: ValueType,
    pub value: f64,
    /// Values for `desc.label_names`, in the same order.
    pub label_values: Vec<String>,
}

impl Sample {
    pub fn gauge(desc: Arc<MetricDesc>, value: f64, label_values: Vec<String>) -> Self {
        Self {
            desc,
            value_type: ValueType::Gauge,
            value,
            label_values,
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }
}
