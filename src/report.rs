//! JSON export of a dashboard view.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::compare::{MetricComparison, Ranking};
use crate::logging::run_id;
use crate::pivot::PivotRow;
use crate::sample::Sample;
use crate::session::{DashboardView, Selection};
use crate::stats::StatisticalAnalysis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub selection: Selection,
    pub sample_count: usize,
    /// SHA-256 over the sample set, hex encoded
    pub sample_digest: String,
    pub analysis: StatisticalAnalysis,
    pub pivot: Vec<PivotRow>,
    pub comparison: BTreeMap<String, Option<MetricComparison>>,
    pub rankings: BTreeMap<String, Vec<Ranking>>,
}

impl Report {
    pub fn from_view(selection: &Selection, view: &DashboardView, generated_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id().to_string(),
            generated_at,
            selection: selection.clone(),
            sample_count: view.samples.len(),
            sample_digest: sample_digest(&view.samples),
            analysis: view.analysis.clone(),
            pivot: view.pivot.clone(),
            comparison: view.metric_comparisons.clone(),
            rankings: view.rankings.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize report")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(path, self.to_json()?).with_context(|| format!("write report {}", path.display()))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read report {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse report {}", path.display()))
    }
}

/// Order-sensitive fingerprint of a sample set.
pub fn sample_digest(samples: &[Sample]) -> String {
    let mut hasher = Sha256::new();
    for s in samples {
        hasher.update(s.entity_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(s.metric.as_bytes());
        hasher.update([0u8]);
        hasher.update(s.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(s.value.to_bits().to_le_bytes());
    }
    hex::encode(hasher.finalize())
}
