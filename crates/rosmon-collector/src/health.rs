use crate::descriptor::DescriptorTable;
use crate::{Collector, CollectorContext};
use anyhow::Result;
use async_trait::async_trait;
use rosmon_api::Sentence;
use rosmon_common::types::{MetricDesc, Sample, DEVICE_LABELS};
use std::sync::Arc;

const SUBSYSTEM: &str = "health";

const COMMAND: [&str; 2] = ["/system/health/print", "=.proplist=name,value"];

/// Health properties exported as gauges, with their help text.
const PROPERTIES: &[(&str, &str)] = &[
    ("voltage", "Input voltage to the RouterOS board, in volts"),
    ("temperature", "Temperature of RouterOS board, in degrees Celsius"),
    ("cpu-temperature", "Temperature of RouterOS CPU, in degrees Celsius"),
    ("sfp-temperature", "Temperature of RouterOS SFP module, in degrees Celsius"),
    ("board-temperature1", "Temperature of RouterOS board - sensor 1, in degrees Celsius"),
    ("board-temperature2", "Temperature of RouterOS board - sensor 2, in degrees Celsius"),
    ("fan1-speed", "Fan 1 speed, in RPM"),
    ("fan2-speed", "Fan 2 speed, in RPM"),
    ("fan3-speed", "Fan 3 speed, in RPM"),
];

/// Hardware health readings from `/system/health`.
pub struct HealthCollector {
    descriptors: DescriptorTable,
}

impl HealthCollector {
    pub fn new() -> Self {
        Self {
            descriptors: DescriptorTable::new(SUBSYSTEM, &DEVICE_LABELS, PROPERTIES),
        }
    }

    async fn fetch(&self, ctx: &CollectorContext<'_>) -> Result<Vec<Sentence>> {
        match ctx.client.run(&COMMAND).await {
            Ok(reply) => Ok(reply.re),
            Err(e) => {
                tracing::error!(
                    device = %ctx.device.name,
                    error = %e,
                    "Failed to fetch system health metrics"
                );
                Err(e.into())
            }
        }
    }

    fn collect_for_record(&self, record: &Sentence, ctx: &CollectorContext<'_>) {
        let Some(property) = record.get("name") else {
            return;
        };
        let Some(desc) = self.descriptors.get(property) else {
            return;
        };
        let raw = record.get("value").unwrap_or_default();
        if raw.is_empty() {
            return;
        }

        let value = match parse_value(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    device = %ctx.device.name,
                    property = %property,
                    value = %raw,
                    error = %e,
                    "Failed to parse system health metric value"
                );
                return;
            }
        };

        ctx.sink.emit(Sample::gauge(
            Arc::clone(desc),
            value,
            ctx.device.label_values(),
        ));
    }
}

/// Parse a reading, rejecting finite literals that overflow `f64` the way
/// `strconv.ParseFloat` reports a range error.
fn parse_value(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    if value.is_infinite() {
        let literal = raw.trim_start_matches(['+', '-']).to_ascii_lowercase();
        if literal != "inf" && literal != "infinity" {
            return Err("value out of range".to_string());
        }
    }
    Ok(value)
}

impl Default for HealthCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for HealthCollector {
    fn name(&self) -> &str {
        SUBSYSTEM
    }

    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        self.descriptors.descriptors().to_vec()
    }

    async fn collect(&self, ctx: &CollectorContext<'_>) -> Result<()> {
        let records = self.fetch(ctx).await?;
        for record in &records {
            self.collect_for_record(record, ctx);
        }
        Ok(())
    }
}
