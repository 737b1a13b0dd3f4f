//! Static metric reference table.
//!
//! Metric definitions are looked up by id and never mutated. Live-stream
//! metrics additionally carry warning/critical bands used to classify
//! readings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Continuous,
    Discrete,
    Categorical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
    pub kind: ValueKind,
    pub color: &'static str,
}

pub const METRICS: [MetricDefinition; 10] = [
    MetricDefinition { id: "temperature", name: "Temperature", unit: "°C", description: "Operating temperature", kind: ValueKind::Continuous, color: "#ef4444" },
    MetricDefinition { id: "voltage", name: "Voltage", unit: "V", description: "Supply voltage", kind: ValueKind::Continuous, color: "#3b82f6" },
    MetricDefinition { id: "current", name: "Current", unit: "mA", description: "Current consumption", kind: ValueKind::Continuous, color: "#10b981" },
    MetricDefinition { id: "frequency", name: "Frequency", unit: "MHz", description: "Operating frequency", kind: ValueKind::Continuous, color: "#f59e0b" },
    MetricDefinition { id: "power", name: "Power", unit: "mW", description: "Power consumption", kind: ValueKind::Continuous, color: "#8b5cf6" },
    MetricDefinition { id: "efficiency", name: "Efficiency", unit: "%", description: "Power efficiency", kind: ValueKind::Continuous, color: "#06b6d4" },
    MetricDefinition { id: "latency", name: "Latency", unit: "ms", description: "Response latency", kind: ValueKind::Continuous, color: "#f97316" },
    MetricDefinition { id: "throughput", name: "Throughput", unit: "Mbps", description: "Data throughput", kind: ValueKind::Continuous, color: "#84cc16" },
    MetricDefinition { id: "noise", name: "Noise Level", unit: "dB", description: "Signal noise level", kind: ValueKind::Continuous, color: "#ec4899" },
    MetricDefinition { id: "stability", name: "Stability", unit: "%", description: "Signal stability", kind: ValueKind::Continuous, color: "#14b8a6" },
];

pub fn lookup(id: &str) -> Option<&'static MetricDefinition> {
    METRICS.iter().find(|m| m.id == id)
}

/// Unit for a metric id, empty when the metric is not in the catalog.
pub fn unit_of(id: &str) -> &'static str {
    lookup(id).map(|m| m.unit).unwrap_or("")
}

/// Display name for a metric id, falling back to the id itself.
pub fn display_name(id: &str) -> &str {
    lookup(id).map(|m| m.name).unwrap_or(id)
}

pub fn all_ids() -> Vec<&'static str> {
    METRICS.iter().map(|m| m.id).collect()
}

// =============================================================================
// Live metric bands
// =============================================================================

/// Optional lower/upper bound; a value outside either side trips the band.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Band {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Band {
    pub const fn upper(max: f64) -> Self {
        Self { min: None, max: Some(max) }
    }

    pub const fn lower(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub const fn between(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn is_violated(&self, value: f64) -> bool {
        self.min.map(|m| value < m).unwrap_or(false) || self.max.map(|m| value > m).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveMetric {
    pub id: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub range: (f64, f64),
    pub target: f64,
    pub warning: Band,
    pub critical: Band,
}

impl LiveMetric {
    /// Critical is checked before warning.
    pub fn status(&self, value: f64) -> Status {
        if self.critical.is_violated(value) {
            Status::Critical
        } else if self.warning.is_violated(value) {
            Status::Warning
        } else {
            Status::Normal
        }
    }
}

pub const LIVE_METRICS: [LiveMetric; 6] = [
    LiveMetric { id: "voltage", name: "Supply Voltage", unit: "V", range: (0.0, 6.0), target: 3.3, warning: Band::between(3.0, 3.6), critical: Band::between(2.8, 3.8) },
    LiveMetric { id: "current", name: "Supply Current", unit: "mA", range: (0.0, 600.0), target: 100.0, warning: Band::upper(400.0), critical: Band::upper(500.0) },
    LiveMetric { id: "temperature", name: "Temperature", unit: "°C", range: (-10.0, 100.0), target: 25.0, warning: Band::upper(70.0), critical: Band::upper(85.0) },
    LiveMetric { id: "frequency", name: "Clock Frequency", unit: "MHz", range: (0.0, 120.0), target: 50.0, warning: Band::between(45.0, 55.0), critical: Band::between(40.0, 60.0) },
    LiveMetric { id: "efficiency", name: "Efficiency", unit: "%", range: (0.0, 100.0), target: 85.0, warning: Band::lower(80.0), critical: Band::lower(75.0) },
    LiveMetric { id: "snr", name: "Signal-to-Noise Ratio", unit: "dB", range: (0.0, 60.0), target: 40.0, warning: Band::lower(35.0), critical: Band::lower(30.0) },
];

pub fn live_metric(id: &str) -> Option<&'static LiveMetric> {
    LIVE_METRICS.iter().find(|m| m.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(lookup("voltage").map(|m| m.unit), Some("V"));
        assert!(lookup("bogus").is_none());
        assert_eq!(unit_of("bogus"), "");
        assert_eq!(display_name("noise"), "Noise Level");
        assert_eq!(display_name("bogus"), "bogus");
    }

    #[test]
    fn test_catalog_ids_unique() {
        let mut ids = all_ids();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), METRICS.len());
    }

    #[test]
    fn test_live_status_critical_before_warning() {
        let current = live_metric("current").unwrap();
        assert_eq!(current.status(100.0), Status::Normal);
        assert_eq!(current.status(450.0), Status::Warning);
        assert_eq!(current.status(550.0), Status::Critical);

        let eff = live_metric("efficiency").unwrap();
        assert_eq!(eff.status(78.0), Status::Warning);
        assert_eq!(eff.status(70.0), Status::Critical);

        let freq = live_metric("frequency").unwrap();
        assert_eq!(freq.status(50.0), Status::Normal);
        assert_eq!(freq.status(44.0), Status::Warning);
        assert_eq!(freq.status(61.0), Status::Critical);
    }
}
