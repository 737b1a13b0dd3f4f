//! Statistics engine.
//!
//! Pure functions over a flat sample set:
//! - per-metric descriptive summary
//! - pairwise Pearson correlation between metrics
//! - least-squares trend of value against sample index
//! - anomaly extraction with severity relative to the metric spread

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::logging::{log_analysis, ProfileScope};
use crate::sample::Sample;

/// Slopes with a magnitude below this are classified as stable.
pub const STABLE_SLOPE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistic {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Stable,
}

impl Direction {
    pub fn from_slope(slope: f64) -> Self {
        if slope.abs() < STABLE_SLOPE {
            Direction::Stable
        } else if slope > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendEstimate {
    pub slope: f64,
    pub intercept: f64,
    pub r2: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub metric: String,
    pub entity_id: String,
    pub value: f64,
    pub severity: Severity,
}

pub type CorrelationMatrix = BTreeMap<String, BTreeMap<String, f64>>;

/// How two metrics are paired before correlating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum CorrelationMode {
    /// Pair the i-th sample of one metric with the i-th of the other, in
    /// generation order, over the shorter length.
    Index,
    /// Pair samples of the same entity whose timestamps are at most
    /// `tolerance_ms` apart.
    Aligned { tolerance_ms: i64 },
}

impl Default for CorrelationMode {
    fn default() -> Self {
        CorrelationMode::Aligned { tolerance_ms: 1000 }
    }
}

impl CorrelationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationMode::Index => "index",
            CorrelationMode::Aligned { .. } => "aligned",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalAnalysis {
    pub summary: BTreeMap<String, SummaryStatistic>,
    pub correlation: CorrelationMatrix,
    pub trends: BTreeMap<String, TrendEstimate>,
    pub anomalies: Vec<Anomaly>,
}

// =============================================================================
// Entry points
// =============================================================================

/// Full analysis using index-paired correlation.
pub fn summarize(samples: &[Sample]) -> StatisticalAnalysis {
    summarize_with(samples, CorrelationMode::Index)
}

pub fn summarize_with(samples: &[Sample], mode: CorrelationMode) -> StatisticalAnalysis {
    let _scope = ProfileScope::with_context(
        "summarize",
        &[("samples", serde_json::json!(samples.len()))],
    );
    let groups = group_by_metric(samples);

    let summary: BTreeMap<String, SummaryStatistic> = groups
        .iter()
        .filter_map(|(metric, values)| describe(values).map(|s| (metric.to_string(), s)))
        .collect();

    let correlation = match mode {
        CorrelationMode::Index => correlate_by_index(&groups),
        CorrelationMode::Aligned { tolerance_ms } => correlate_aligned(samples, tolerance_ms),
    };

    let trends: BTreeMap<String, TrendEstimate> = groups
        .iter()
        .map(|(metric, values)| (metric.to_string(), linear_trend(values)))
        .collect();

    let anomalies = extract_anomalies(samples, &summary);

    log_analysis(summary.len(), samples.len(), anomalies.len(), mode.as_str());

    StatisticalAnalysis {
        summary,
        correlation,
        trends,
        anomalies,
    }
}

/// Values per metric, in input order within each metric.
pub fn group_by_metric(samples: &[Sample]) -> BTreeMap<&str, Vec<f64>> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for s in samples {
        groups.entry(s.metric.as_str()).or_default().push(s.value);
    }
    groups
}

// =============================================================================
// Descriptive statistics
// =============================================================================

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Element at `floor(n/2)` of the sorted values: the upper middle for even n.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(sorted[sorted.len() / 2])
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.max(0.0).sqrt())
}

pub fn describe(values: &[f64]) -> Option<SummaryStatistic> {
    let mean = mean(values)?;
    let median = median(values)?;
    let std = population_std(values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(SummaryStatistic {
        mean,
        median,
        std,
        min,
        max,
        count: values.len(),
    })
}

// =============================================================================
// Correlation
// =============================================================================

/// Pearson coefficient of two equally long series; 0 when either has no
/// variance or the series are empty.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        numerator += dx * dy;
        sum_x += dx * dx;
        sum_y += dy * dy;
    }

    let denominator = (sum_x * sum_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        (numerator / denominator).clamp(-1.0, 1.0)
    }
}

/// Fill the matrix from a pairwise function, computing each unordered pair
/// once so the result is exactly symmetric.
fn build_matrix<F>(metrics: &[&str], mut pair: F) -> CorrelationMatrix
where
    F: FnMut(&str, &str) -> f64,
{
    let mut matrix: CorrelationMatrix = BTreeMap::new();
    for (i, &a) in metrics.iter().enumerate() {
        matrix.entry(a.to_string()).or_default().insert(a.to_string(), 1.0);
        for &b in &metrics[i + 1..] {
            let r = pair(a, b);
            matrix.entry(a.to_string()).or_default().insert(b.to_string(), r);
            matrix.entry(b.to_string()).or_default().insert(a.to_string(), r);
        }
    }
    matrix
}

pub fn correlate_by_index(groups: &BTreeMap<&str, Vec<f64>>) -> CorrelationMatrix {
    let metrics: Vec<&str> = groups.keys().copied().collect();
    build_matrix(&metrics, |a, b| pearson(&groups[a], &groups[b]))
}

/// Pair samples of the same entity whose timestamps differ by at most
/// `tolerance_ms`. Each sample joins at most one partner; matching walks both
/// series in time order.
pub fn correlate_aligned(samples: &[Sample], tolerance_ms: i64) -> CorrelationMatrix {
    let tolerance_ms = tolerance_ms.max(0);

    // metric -> entity -> (ts_ms, value), sorted by time
    let mut by_metric: BTreeMap<&str, BTreeMap<&str, Vec<(i64, f64)>>> = BTreeMap::new();
    for s in samples {
        by_metric
            .entry(s.metric.as_str())
            .or_default()
            .entry(s.entity_id.as_str())
            .or_default()
            .push((s.timestamp.timestamp_millis(), s.value));
    }
    for series in by_metric.values_mut().flat_map(|m| m.values_mut()) {
        series.sort_by_key(|(ts, _)| *ts);
    }

    let metrics: Vec<&str> = by_metric.keys().copied().collect();
    build_matrix(&metrics, |a, b| {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (entity, left) in &by_metric[a] {
            let Some(right) = by_metric[b].get(entity) else { continue };
            join_within(left, right, tolerance_ms, &mut xs, &mut ys);
        }
        pearson(&xs, &ys)
    })
}

fn join_within(left: &[(i64, f64)], right: &[(i64, f64)], tolerance_ms: i64, xs: &mut Vec<f64>, ys: &mut Vec<f64>) {
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (ta, va) = left[i];
        let (tb, vb) = right[j];
        if (ta - tb).abs() <= tolerance_ms {
            xs.push(va);
            ys.push(vb);
            i += 1;
            j += 1;
        } else if ta < tb {
            i += 1;
        } else {
            j += 1;
        }
    }
}

// =============================================================================
// Trend
// =============================================================================

/// Ordinary least squares of value against sample index.
pub fn linear_trend(values: &[f64]) -> TrendEstimate {
    let n = values.len() as f64;
    if values.is_empty() {
        return TrendEstimate {
            slope: 0.0,
            intercept: 0.0,
            r2: 0.0,
            direction: Direction::Stable,
        };
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denom = n * sum_xx - sum_x * sum_x;
    let slope = if denom.abs() > 0.0 {
        (n * sum_xy - sum_x * sum_y) / denom
    } else {
        0.0
    };
    let intercept = (sum_y - slope * sum_x) / n;

    let mean_y = sum_y / n;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, y) in values.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }
    // A constant series is fit exactly by a flat line.
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    TrendEstimate {
        slope,
        intercept,
        r2,
        direction: Direction::from_slope(slope),
    }
}

// =============================================================================
// Anomalies
// =============================================================================

pub fn classify_severity(value: f64, stat: &SummaryStatistic) -> Severity {
    if (value - stat.mean).abs() > 2.0 * stat.std {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Samples flagged at generation time, graded against their metric's spread.
pub fn extract_anomalies(samples: &[Sample], summary: &BTreeMap<String, SummaryStatistic>) -> Vec<Anomaly> {
    samples
        .iter()
        .filter(|s| s.is_anomaly())
        .filter_map(|s| {
            let stat = summary.get(&s.metric)?;
            Some(Anomaly {
                timestamp: s.timestamp,
                metric: s.metric.clone(),
                entity_id: s.entity_id.clone(),
                value: s.value,
                severity: classify_severity(s.value, stat),
            })
        })
        .collect()
}
