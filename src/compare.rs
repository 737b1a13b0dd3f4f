//! Entity comparison and ranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::logging::ProfileScope;
use crate::stats::Direction;

/// Scalar performance figures for one (entity, metric).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub current: f64,
    pub target: f64,
    /// Score in [0, 100]
    pub performance: f64,
    pub trend: Direction,
    pub change_pct: f64,
    pub stability: f64,
    pub samples: u32,
}

impl ComparisonEntry {
    /// Entry with only a current value, as used by plain value comparisons.
    pub fn from_value(current: f64) -> Self {
        Self {
            current,
            target: current,
            performance: 0.0,
            trend: Direction::Stable,
            change_pct: 0.0,
            stability: 0.0,
            samples: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityComparison {
    pub entity_id: String,
    pub metrics: BTreeMap<String, ComparisonEntry>,
}

impl EntityComparison {
    pub fn new(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with(mut self, metric: &str, entry: ComparisonEntry) -> Self {
        self.metrics.insert(metric.to_string(), entry);
        self
    }
}

/// Entities in selection order; order decides ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub entities: Vec<EntityComparison>,
}

impl ComparisonTable {
    /// Build from plain `(entity, metric, value)` triples.
    pub fn from_values(values: &[(&str, &str, f64)]) -> Self {
        let mut table = Self::default();
        for (entity, metric, value) in values {
            let pos = match table.entities.iter().position(|e| e.entity_id == *entity) {
                Some(pos) => pos,
                None => {
                    table.entities.push(EntityComparison::new(entity));
                    table.entities.len() - 1
                }
            };
            table.entities[pos]
                .metrics
                .insert(metric.to_string(), ComparisonEntry::from_value(*value));
        }
        table
    }

    fn current(&self, metric: &str) -> Vec<f64> {
        // Missing entries count as zero.
        self.entities
            .iter()
            .map(|e| e.metrics.get(metric).map(|m| m.current).unwrap_or(0.0))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub best: f64,
    pub worst: f64,
    pub average: f64,
    pub range: f64,
    /// `None` when the worst value is zero
    pub improvement_pct: Option<f64>,
    pub leader: String,
}

/// Best/worst summary of one metric across entities; `None` with fewer
/// than two entities.
pub fn compare(table: &ComparisonTable, metric: &str) -> Option<MetricComparison> {
    if table.entities.len() < 2 {
        return None;
    }
    let values = table.current(metric);
    let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let worst = values.iter().copied().fold(f64::INFINITY, f64::min);
    let average = values.iter().sum::<f64>() / values.len() as f64;

    let improvement = (best - worst) / worst * 100.0;
    let improvement_pct = if worst != 0.0 && improvement.is_finite() {
        Some(improvement)
    } else {
        None
    };

    let leader_idx = values.iter().position(|v| *v == best).unwrap_or(0);

    Some(MetricComparison {
        best,
        worst,
        average,
        range: best - worst,
        improvement_pct,
        leader: table.entities[leader_idx].entity_id.clone(),
    })
}

pub fn compare_all<M: AsRef<str>>(table: &ComparisonTable, metrics: &[M]) -> BTreeMap<String, Option<MetricComparison>> {
    let _scope = ProfileScope::new("compare_all");
    metrics
        .iter()
        .map(|m| (m.as_ref().to_string(), compare(table, m.as_ref())))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// 1-based
    pub position: usize,
    pub entity_id: String,
    pub performance: f64,
}

/// Entities ordered by performance score, highest first; ties keep input
/// order.
pub fn rank(table: &ComparisonTable, metric: &str) -> Vec<Ranking> {
    let mut scored: Vec<(&str, f64)> = table
        .entities
        .iter()
        .map(|e| {
            let score = e.metrics.get(metric).map(|m| m.performance).unwrap_or(0.0);
            (e.entity_id.as_str(), score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .enumerate()
        .map(|(i, (entity_id, performance))| Ranking {
            position: i + 1,
            entity_id: entity_id.to_string(),
            performance,
        })
        .collect()
}
