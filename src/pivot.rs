//! Reshape flat samples into chart-ready rows.
//!
//! One row per (time bucket, entity), one column per metric. Filters run
//! first; rows come out in ascending bucket order.

use chrono::{DateTime, Datelike, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::filter::{apply_filters, DataFilter};
use crate::logging::log_pivot;
use crate::sample::{entity_name, Entity, Sample};
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    /// Weeks start Monday 00:00 UTC
    Week,
}

impl Granularity {
    pub fn bucket(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Hour => ts.duration_trunc(Duration::hours(1)).unwrap_or(ts),
            Granularity::Day => ts.duration_trunc(Duration::days(1)).unwrap_or(ts),
            Granularity::Week => {
                let day = Granularity::Day.bucket(ts);
                day - Duration::days(day.weekday().num_days_from_monday() as i64)
            }
        }
    }
}

/// How several values landing in the same cell are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Last write wins
    #[default]
    Raw,
    Average,
    Sum,
    Min,
    Max,
    Median,
    Std,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Raw => "raw",
            Aggregation::Average => "average",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
            Aggregation::Std => "std",
        }
    }

    /// `None` only for an empty cell.
    pub fn combine(&self, values: &[f64]) -> Option<f64> {
        match self {
            Aggregation::Raw => values.last().copied(),
            Aggregation::Average => stats::mean(values),
            Aggregation::Sum => (!values.is_empty()).then(|| values.iter().sum()),
            Aggregation::Min => values.iter().copied().reduce(f64::min),
            Aggregation::Max => values.iter().copied().reduce(f64::max),
            Aggregation::Median => stats::median(values),
            Aggregation::Std => stats::population_std(values),
        }
    }
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotOptions {
    pub granularity: Granularity,
    pub aggregation: Aggregation,
    /// Restrict columns to these metrics; `None` keeps all
    pub metrics: Option<Vec<String>>,
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub bucket: DateTime<Utc>,
    pub entity_id: String,
    pub entity_name: String,
    /// Sparse: a metric with no sample in this cell is absent
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

struct Cell<'a> {
    bucket: DateTime<Utc>,
    entity_id: &'a str,
    columns: BTreeMap<&'a str, Vec<f64>>,
}

pub fn pivot(samples: &[Sample], entities: &[Entity], filters: &[DataFilter], opts: &PivotOptions) -> Vec<PivotRow> {
    let kept: Vec<&Sample> = apply_filters(samples, filters)
        .into_iter()
        .filter(|s| opts.time_range.map(|r| r.contains(s.timestamp)).unwrap_or(true))
        .filter(|s| {
            opts.metrics
                .as_ref()
                .map(|ms| ms.iter().any(|m| *m == s.metric))
                .unwrap_or(true)
        })
        .collect();

    let mut cells: Vec<Cell> = Vec::new();
    let mut index: HashMap<(DateTime<Utc>, &str), usize> = HashMap::new();
    for &s in &kept {
        let bucket = opts.granularity.bucket(s.timestamp);
        let key = (bucket, s.entity_id.as_str());
        let idx = *index.entry(key).or_insert_with(|| {
            cells.push(Cell {
                bucket,
                entity_id: s.entity_id.as_str(),
                columns: BTreeMap::new(),
            });
            cells.len() - 1
        });
        cells[idx]
            .columns
            .entry(s.metric.as_str())
            .or_default()
            .push(s.value);
    }

    // Stable: equal buckets keep first-seen order.
    cells.sort_by_key(|c| c.bucket);

    let rows: Vec<PivotRow> = cells
        .into_iter()
        .map(|cell| PivotRow {
            bucket: cell.bucket,
            entity_id: cell.entity_id.to_string(),
            entity_name: entity_name(entities, cell.entity_id).to_string(),
            values: cell
                .columns
                .iter()
                .filter_map(|(metric, vals)| opts.aggregation.combine(vals).map(|v| (metric.to_string(), v)))
                .collect(),
        })
        .collect();

    log_pivot(samples.len(), kept.len(), rows.len(), opts.aggregation.as_str());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 30, 0).unwrap()
    }

    fn sample(entity: &str, metric: &str, ts: DateTime<Utc>, value: f64) -> Sample {
        Sample {
            id: format!("{}-{}-{}", entity, metric, ts.timestamp()),
            entity_id: entity.to_string(),
            metric: metric.to_string(),
            value,
            unit: String::new(),
            timestamp: ts,
            meta: None,
        }
    }

    fn entities() -> Vec<Entity> {
        vec![Entity::new("a", "Alpha")]
    }

    #[test]
    fn test_buckets() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 16, 13, 45, 10).unwrap();
        assert_eq!(Granularity::Hour.bucket(ts), Utc.with_ymd_and_hms(2025, 1, 16, 13, 0, 0).unwrap());
        assert_eq!(Granularity::Day.bucket(ts), Utc.with_ymd_and_hms(2025, 1, 16, 0, 0, 0).unwrap());
        // 2025-01-16 is a Thursday
        assert_eq!(Granularity::Week.bucket(ts), Utc.with_ymd_and_hms(2025, 1, 13, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_raw_is_last_write_wins() {
        let samples = vec![
            sample("a", "voltage", at(2, 1), 1.0),
            sample("a", "voltage", at(2, 5), 2.0),
            sample("a", "current", at(2, 3), 9.0),
        ];
        let rows = pivot(&samples, &entities(), &[], &PivotOptions::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values["voltage"], 2.0);
        assert_eq!(rows[0].values["current"], 9.0);
        assert_eq!(rows[0].entity_name, "Alpha");
        assert_eq!(rows[0].bucket, Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_declared_aggregation_applies() {
        let samples = vec![
            sample("a", "voltage", at(2, 1), 1.0),
            sample("a", "voltage", at(2, 2), 2.0),
            sample("a", "voltage", at(2, 3), 6.0),
        ];
        let expect = [
            (Aggregation::Average, 3.0),
            (Aggregation::Sum, 9.0),
            (Aggregation::Min, 1.0),
            (Aggregation::Max, 6.0),
            (Aggregation::Median, 2.0),
        ];
        for (aggregation, want) in expect {
            let opts = PivotOptions { aggregation, ..PivotOptions::default() };
            let rows = pivot(&samples, &entities(), &[], &opts);
            assert!((rows[0].values["voltage"] - want).abs() < 1e-12, "{:?}", aggregation);
        }
        let opts = PivotOptions { aggregation: Aggregation::Std, ..PivotOptions::default() };
        let std = pivot(&samples, &entities(), &[], &opts)[0].values["voltage"];
        assert!((std - (14.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_rows_sorted_by_bucket_then_first_seen() {
        let samples = vec![
            sample("b", "voltage", at(3, 1), 1.0),
            sample("a", "voltage", at(1, 1), 2.0),
            sample("c", "voltage", at(3, 2), 3.0),
        ];
        let rows = pivot(&samples, &entities(), &[], &PivotOptions::default());
        let order: Vec<&str> = rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(rows[1].entity_name, "b");
    }

    #[test]
    fn test_filters_metrics_and_range() {
        let samples = vec![
            sample("a", "voltage", at(1, 1), 1.0),
            sample("a", "voltage", at(2, 1), 5.0),
            sample("a", "current", at(2, 1), 50.0),
            sample("a", "voltage", at(4, 1), 8.0),
        ];
        let opts = PivotOptions {
            metrics: Some(vec!["voltage".into()]),
            time_range: Some(TimeRange { start: at(2, 0), end: at(10, 0) }),
            ..PivotOptions::default()
        };
        let rows = pivot(&samples, &entities(), &[DataFilter::less("f", 6.0)], &opts);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values.len(), 1);
        assert_eq!(rows[0].values["voltage"], 5.0);
    }

    #[test]
    fn test_empty_and_idempotent() {
        assert!(pivot(&[], &entities(), &[], &PivotOptions::default()).is_empty());
        let samples = vec![sample("a", "voltage", at(1, 1), 1.0), sample("a", "noise", at(2, 1), 3.0)];
        let first = pivot(&samples, &entities(), &[], &PivotOptions::default());
        let second = pivot(&samples, &entities(), &[], &PivotOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_row_serializes_flat() {
        let rows = pivot(&[sample("a", "voltage", at(1, 1), 1.5)], &entities(), &[], &PivotOptions::default());
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["voltage"], 1.5);
        assert_eq!(json["entity_name"], "Alpha");
    }
}
