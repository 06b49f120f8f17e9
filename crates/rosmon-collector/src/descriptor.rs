use rosmon_common::types::MetricDesc;
use std::collections::HashMap;
use std::sync::Arc;

/// Descriptors of one collector, keyed by device property name.
///
/// Built once from an ordered `(property, help)` table and read-only
/// afterwards, so concurrent collect calls share it without locking.
///
/// # Examples
///
/// ```
/// use rosmon_collector::descriptor::DescriptorTable;
///
/// let table = DescriptorTable::new(
///     "health",
///     &["name", "address"],
///     &[("voltage", "Input voltage, in volts")],
/// );
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.get("voltage").unwrap().name, "mikrotik_health_voltage");
/// assert!(table.get("fan9-speed").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    ordered: Vec<Arc<MetricDesc>>,
    by_property: HashMap<String, Arc<MetricDesc>>,
}

impl DescriptorTable {
    /// # Panics
    ///
    /// Panics if a property appears twice in `entries`.
    pub fn new(subsystem: &str, label_names: &[&str], entries: &[(&str, &str)]) -> Self {
        let mut ordered = Vec::with_capacity(entries.len());
        let mut by_property = HashMap::with_capacity(entries.len());

        for (property, help) in entries {
            let desc = Arc::new(MetricDesc::new(subsystem, property, help, label_names));
            let previous = by_property.insert((*property).to_string(), Arc::clone(&desc));
            assert!(
                previous.is_none(),
                "duplicate property {property:?} in {subsystem} descriptor table"
            );
            ordered.push(desc);
        }

        Self {
            ordered,
            by_property,
        }
    }

    pub fn get(&self, property: &str) -> Option<&Arc<MetricDesc>> {
        self.by_property.get(property)
    }

    /// Descriptors in table order.
    pub fn descriptors(&self) -> &[Arc<MetricDesc>] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
