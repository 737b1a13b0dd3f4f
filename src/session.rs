//! Dashboard session: selection state, identity gating and full recompute.
//!
//! A [`Selection`] is an immutable value; every edit returns a new one. The
//! dashboard recomputes its whole view from a selection each time, so two
//! calls with the same selection and seed produce the same view.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::compare::{compare_all, rank, ComparisonTable, MetricComparison, Ranking};
use crate::config::Config;
use crate::filter::DataFilter;
use crate::generator::PointGenerator;
use crate::logging::{log, obj, v_str, Domain, Level, ProfileScope};
use crate::pivot::{pivot, Aggregation, Granularity, PivotOptions, PivotRow, TimeRange};
use crate::sample::{Entity, Sample};
use crate::stats::{summarize_with, CorrelationMode, StatisticalAnalysis};

// =============================================================================
// Selection
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub entities: Vec<String>,
    pub metrics: Vec<String>,
    pub filters: Vec<DataFilter>,
    pub aggregation: Aggregation,
    pub granularity: Granularity,
    pub correlation: CorrelationMode,
    pub duration_days: u32,
    pub time_range: Option<TimeRange>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Selection {
    pub fn new<E: AsRef<str>, M: AsRef<str>>(entities: &[E], metrics: &[M]) -> Self {
        Self {
            entities: entities.iter().map(|e| e.as_ref().to_string()).collect(),
            metrics: metrics.iter().map(|m| m.as_ref().to_string()).collect(),
            filters: Vec::new(),
            aggregation: Aggregation::default(),
            granularity: Granularity::default(),
            correlation: CorrelationMode::default(),
            duration_days: 7,
            time_range: None,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let ids: Vec<&str> = cfg.entities.iter().map(|e| e.id.as_str()).collect();
        Self {
            correlation: CorrelationMode::Aligned {
                tolerance_ms: cfg.align_tolerance_ms,
            },
            duration_days: cfg.duration_days,
            ..Self::new(&ids, &cfg.metrics)
        }
    }

    pub fn with_entities<E: AsRef<str>>(&self, entities: &[E]) -> Self {
        Self {
            entities: entities.iter().map(|e| e.as_ref().to_string()).collect(),
            ..self.clone()
        }
    }

    pub fn with_metrics<M: AsRef<str>>(&self, metrics: &[M]) -> Self {
        Self {
            metrics: metrics.iter().map(|m| m.as_ref().to_string()).collect(),
            ..self.clone()
        }
    }

    /// Adds the entity, or removes it if already selected.
    pub fn toggle_entity(&self, id: &str) -> Self {
        let mut next = self.clone();
        match next.entities.iter().position(|e| e == id) {
            Some(pos) => {
                next.entities.remove(pos);
            }
            None => next.entities.push(id.to_string()),
        }
        next
    }

    pub fn toggle_metric(&self, id: &str) -> Self {
        let mut next = self.clone();
        match next.metrics.iter().position(|m| m == id) {
            Some(pos) => {
                next.metrics.remove(pos);
            }
            None => next.metrics.push(id.to_string()),
        }
        next
    }

    pub fn with_filter(&self, filter: DataFilter) -> Self {
        let mut next = self.clone();
        next.filters.push(filter);
        next
    }

    pub fn without_filter(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.filters.retain(|f| f.id != id);
        next
    }

    pub fn with_aggregation(&self, aggregation: Aggregation) -> Self {
        Self { aggregation, ..self.clone() }
    }

    pub fn with_granularity(&self, granularity: Granularity) -> Self {
        Self { granularity, ..self.clone() }
    }

    pub fn with_correlation(&self, correlation: CorrelationMode) -> Self {
        Self { correlation, ..self.clone() }
    }

    pub fn with_duration(&self, duration_days: u32) -> Self {
        Self { duration_days, ..self.clone() }
    }

    pub fn with_time_range(&self, time_range: Option<TimeRange>) -> Self {
        Self { time_range, ..self.clone() }
    }

    fn pivot_options(&self) -> PivotOptions {
        PivotOptions {
            granularity: self.granularity,
            aggregation: self.aggregation,
            metrics: None,
            time_range: self.time_range,
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    Loading,
    SignedOut,
    SignedIn(User),
}

/// External identity collaborator. The dashboard only reads its state.
pub trait IdentityProvider {
    fn auth_state(&self) -> AuthState;
}

/// Identity that never changes; used by the CLI and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub AuthState);

impl IdentityProvider for StaticIdentity {
    fn auth_state(&self) -> AuthState {
        self.0.clone()
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Everything the presentation layer needs for one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub samples: Vec<Sample>,
    pub analysis: StatisticalAnalysis,
    pub pivot: Vec<PivotRow>,
    pub comparison: ComparisonTable,
    pub metric_comparisons: BTreeMap<String, Option<MetricComparison>>,
    pub rankings: BTreeMap<String, Vec<Ranking>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Loading,
    SignedOut,
    Ready(Box<DashboardView>),
}

pub struct Dashboard {
    entities: Vec<Entity>,
    generator: PointGenerator<StdRng>,
}

impl Dashboard {
    pub fn new(entities: Vec<Entity>, generator: PointGenerator<StdRng>) -> Self {
        Self { entities, generator }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.entities.clone(), PointGenerator::from_config(cfg))
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Recompute the whole view. Statistics cover every generated sample;
    /// filters only shape the pivot.
    pub fn view(&mut self, selection: &Selection, now: DateTime<Utc>) -> DashboardView {
        let _scope = ProfileScope::with_context(
            "dashboard_view",
            &[
                ("entities", json!(selection.entities.len())),
                ("metrics", json!(selection.metrics.len())),
            ],
        );

        let samples = self
            .generator
            .generate(&selection.entities, &selection.metrics, selection.duration_days, now);
        let analysis = summarize_with(&samples, selection.correlation);
        let pivot = pivot(&samples, &self.entities, &selection.filters, &selection.pivot_options());

        let comparison = self
            .generator
            .generate_comparison(&selection.entities, &selection.metrics);
        let metric_comparisons = compare_all(&comparison, &selection.metrics);
        let rankings = selection
            .metrics
            .iter()
            .map(|m| (m.clone(), rank(&comparison, m)))
            .collect();

        DashboardView {
            samples,
            analysis,
            pivot,
            comparison,
            metric_comparisons,
            rankings,
        }
    }

    /// Gate the view on identity: nothing is computed until a user is
    /// signed in.
    pub fn render<I: IdentityProvider + ?Sized>(&mut self, identity: &I, selection: &Selection, now: DateTime<Utc>) -> RenderState {
        match identity.auth_state() {
            AuthState::Loading => RenderState::Loading,
            AuthState::SignedOut => {
                log(Level::Info, Domain::Session, "signed_out", obj(&[]));
                RenderState::SignedOut
            }
            AuthState::SignedIn(user) => {
                log(
                    Level::Debug,
                    Domain::Session,
                    "render",
                    obj(&[
                        ("user", v_str(&user.id)),
                        ("correlation_mode", v_str(selection.correlation.as_str())),
                    ]),
                );
                RenderState::Ready(Box::new(self.view(selection, now)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::default_entities;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, 8, 0, 0).unwrap()
    }

    fn dashboard(seed: u64) -> Dashboard {
        Dashboard::new(default_entities(), PointGenerator::seeded(seed))
    }

    fn signed_in() -> StaticIdentity {
        StaticIdentity(AuthState::SignedIn(User {
            id: "u-1".into(),
            email: "lab@example.com".into(),
        }))
    }

    #[test]
    fn test_selection_is_immutable() {
        let base = Selection::new(&["exp-1"], &["voltage"]);
        let next = base.toggle_entity("exp-2").toggle_metric("voltage");
        assert_eq!(base.entities, vec!["exp-1"]);
        assert_eq!(base.metrics, vec!["voltage"]);
        assert_eq!(next.entities, vec!["exp-1", "exp-2"]);
        assert!(next.metrics.is_empty());
        assert_eq!(next.toggle_entity("exp-1").entities, vec!["exp-2"]);
    }

    #[test]
    fn test_selection_defaults() {
        let sel = Selection::default();
        assert_eq!(sel.entities, vec!["exp-1", "exp-2"]);
        assert_eq!(sel.metrics, vec!["temperature", "voltage", "current"]);
        assert_eq!(sel.correlation, CorrelationMode::Aligned { tolerance_ms: 1000 });
        assert_eq!(sel.duration_days, 7);
        assert_eq!(sel.aggregation, Aggregation::Raw);
    }

    #[test]
    fn test_filter_edits() {
        let sel = Selection::default()
            .with_filter(DataFilter::greater("hi", 10.0))
            .with_filter(DataFilter::less("lo", 90.0));
        assert_eq!(sel.filters.len(), 2);
        assert_eq!(sel.without_filter("hi").filters[0].id, "lo");
    }

    #[test]
    fn test_view_contents() {
        let sel = Selection::new(&["exp-1", "exp-2", "exp-3"], &["voltage", "current"]).with_duration(2);
        let view = dashboard(3).view(&sel, now());
        assert_eq!(view.samples.len(), 3 * 2 * 48);
        assert_eq!(view.analysis.summary.len(), 2);
        assert_eq!(view.comparison.entities.len(), 3);
        assert_eq!(view.metric_comparisons.len(), 2);
        assert_eq!(view.rankings["voltage"].len(), 3);
        // Three entities over two (or three) calendar days
        assert!(view.pivot.len() >= 6);
        assert_eq!(view.pivot[0].entity_name, "PCB Thermal Analysis");
    }

    #[test]
    fn test_view_is_reproducible() {
        let sel = Selection::default().with_duration(1);
        assert_eq!(dashboard(11).view(&sel, now()), dashboard(11).view(&sel, now()));
    }

    #[test]
    fn test_filters_shape_pivot_only() {
        let sel = Selection::new(&["exp-1"], &["voltage"]).with_duration(1);
        let strict = sel.with_filter(DataFilter::greater("none", 1e9));
        let open = dashboard(5).view(&sel, now());
        let filtered = dashboard(5).view(&strict, now());
        assert!(filtered.pivot.is_empty());
        assert!(!open.pivot.is_empty());
        assert_eq!(open.analysis, filtered.analysis);
    }

    #[test]
    fn test_render_gates_on_identity() {
        let sel = Selection::default().with_duration(1);
        let mut dash = dashboard(1);
        assert_eq!(dash.render(&StaticIdentity(AuthState::Loading), &sel, now()), RenderState::Loading);
        assert_eq!(dash.render(&StaticIdentity(AuthState::SignedOut), &sel, now()), RenderState::SignedOut);
        match dash.render(&signed_in(), &sel, now()) {
            RenderState::Ready(view) => assert_eq!(view.samples.len(), 2 * 3 * 24),
            other => panic!("expected ready view, got {:?}", other),
        }
    }
}
