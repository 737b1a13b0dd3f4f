//! Parameter sweep: random exploration of operating points.
//!
//! A sweep draws every enabled parameter uniformly within its bounds, scores
//! the resulting operating point, and marks it passed when it clears the
//! efficiency, power and SNR limits.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::logging::{log, obj, v_str, Domain, Level};

/// Results produced per sweep run.
pub const RESULTS_PER_RUN: usize = 50;
/// Progress gained per runner tick.
pub const PROGRESS_STEP: u32 = 2;

pub const PASS_MIN_EFFICIENCY: f64 = 80.0;
pub const PASS_MAX_POWER: f64 = 5.0;
pub const PASS_MIN_SNR: f64 = 35.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParameter {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub current: f64,
    pub enabled: bool,
}

impl SweepParameter {
    fn new(id: &str, name: &str, unit: &str, bounds: (f64, f64), step: f64, current: f64, enabled: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            min: bounds.0,
            max: bounds.1,
            step,
            current,
            enabled,
        }
    }
}

pub fn default_parameters() -> Vec<SweepParameter> {
    vec![
        SweepParameter::new("voltage", "Supply Voltage", "V", (3.0, 5.0), 0.1, 3.3, true),
        SweepParameter::new("frequency", "Clock Frequency", "MHz", (10.0, 100.0), 5.0, 50.0, true),
        SweepParameter::new("temperature", "Operating Temperature", "°C", (-20.0, 85.0), 5.0, 25.0, false),
        SweepParameter::new("current", "Supply Current", "mA", (10.0, 500.0), 10.0, 100.0, false),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub id: String,
    /// Drawn values of the enabled parameters only
    pub parameters: BTreeMap<String, f64>,
    /// `efficiency`, `power_consumption`, `snr`, `temperature`
    pub metrics: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
}

impl SweepResult {
    pub fn metric(&self, id: &str) -> Option<f64> {
        self.metrics.get(id).copied()
    }
}

/// `count` scored operating points stamped within the 24 h before `now`,
/// newest first.
pub fn generate_results<R: Rng>(rng: &mut R, params: &[SweepParameter], count: usize, now: DateTime<Utc>) -> Vec<SweepResult> {
    let mut results: Vec<SweepResult> = (0..count)
        .map(|i| {
            let parameters: BTreeMap<String, f64> = params
                .iter()
                .filter(|p| p.enabled)
                .map(|p| (p.id.clone(), p.min + rng.gen::<f64>() * (p.max - p.min)))
                .collect();

            let voltage = parameters.get("voltage").copied().unwrap_or(3.3);
            let frequency = parameters.get("frequency").copied().unwrap_or(50.0);

            let efficiency = (85.0 - (voltage - 3.3).abs() * 10.0 - (frequency - 50.0).abs() * 0.2
                + rng.gen::<f64>() * 5.0)
                .max(0.0);
            let power = voltage * voltage * 0.1 + frequency * 0.05 + rng.gen::<f64>() * 2.0;
            let snr = (40.0 + voltage.log10() * 10.0 - frequency * 0.1 + rng.gen::<f64>() * 3.0).max(0.0);
            let temperature = 25.0 + power * 2.0 + rng.gen::<f64>() * 5.0;

            let passed = efficiency > PASS_MIN_EFFICIENCY && power < PASS_MAX_POWER && snr > PASS_MIN_SNR;
            let age_ms = (rng.gen::<f64>() * 86_400_000.0) as i64;

            SweepResult {
                id: format!("result_{}", i),
                parameters,
                metrics: BTreeMap::from([
                    ("efficiency".to_string(), efficiency),
                    ("power_consumption".to_string(), power),
                    ("snr".to_string(), snr),
                    ("temperature".to_string(), temperature),
                ]),
                timestamp: now - Duration::milliseconds(age_ms),
                passed,
            }
        })
        .collect();
    results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    results
}

/// Result with the greatest value of `metric`; the earliest wins ties.
/// Results lacking the metric are skipped.
pub fn best_result<'a>(results: &'a [SweepResult], metric: &str) -> Option<&'a SweepResult> {
    let mut best: Option<(&SweepResult, f64)> = None;
    for r in results {
        let Some(v) = r.metric(metric) else { continue };
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((r, v)),
        }
    }
    best.map(|(r, _)| r)
}

pub fn pass_rate(results: &[SweepResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().filter(|r| r.passed).count() as f64 / results.len() as f64
}

// =============================================================================
// Runner
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Paused,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
        }
    }
}

/// Drives a sweep run: progress climbs by [`PROGRESS_STEP`] per tick and a
/// fresh result set is produced on completion.
pub struct SweepRunner {
    params: Vec<SweepParameter>,
    state: RunState,
    progress: u32,
    results: Vec<SweepResult>,
    rng: StdRng,
}

impl SweepRunner {
    pub fn new(params: Vec<SweepParameter>, rng: StdRng, now: DateTime<Utc>) -> Self {
        let mut runner = Self {
            params,
            state: RunState::Idle,
            progress: 0,
            results: Vec::new(),
            rng,
        };
        runner.regenerate(now);
        runner
    }

    pub fn seeded(seed: u64, now: DateTime<Utc>) -> Self {
        Self::new(default_parameters(), StdRng::seed_from_u64(seed), now)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn results(&self) -> &[SweepResult] {
        &self.results
    }

    pub fn parameters(&self) -> &[SweepParameter] {
        &self.params
    }

    /// Replacing the parameter set regenerates results, as any edit does.
    pub fn set_parameters(&mut self, params: Vec<SweepParameter>, now: DateTime<Utc>) {
        self.params = params;
        self.regenerate(now);
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool, now: DateTime<Utc>) -> bool {
        let Some(param) = self.params.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        param.enabled = enabled;
        self.regenerate(now);
        true
    }

    /// Returns `false` if a run is already in progress.
    pub fn start(&mut self) -> bool {
        if self.state != RunState::Idle {
            return false;
        }
        self.state = RunState::Running;
        self.progress = 0;
        self.log_transition();
        true
    }

    /// Toggle between running and paused; no effect while idle.
    pub fn toggle_pause(&mut self) -> RunState {
        self.state = match self.state {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
            RunState::Idle => RunState::Idle,
        };
        self.log_transition();
        self.state
    }

    /// Returns `false` if nothing was running.
    pub fn stop(&mut self) -> bool {
        if self.state == RunState::Idle {
            return false;
        }
        self.state = RunState::Idle;
        self.progress = 0;
        self.log_transition();
        true
    }

    /// Advance one step. Returns `true` when this tick completed the run.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        self.progress += PROGRESS_STEP;
        if self.progress < 100 {
            return false;
        }
        self.state = RunState::Idle;
        self.progress = 0;
        self.regenerate(now);
        log(
            Level::Info,
            Domain::Sweep,
            "completed",
            obj(&[
                ("results", json!(self.results.len())),
                ("pass_rate", json!(pass_rate(&self.results))),
            ]),
        );
        true
    }

    pub fn best(&self, metric: &str) -> Option<&SweepResult> {
        best_result(&self.results, metric)
    }

    fn regenerate(&mut self, now: DateTime<Utc>) {
        self.results = generate_results(&mut self.rng, &self.params, RESULTS_PER_RUN, now);
    }

    fn log_transition(&self) {
        log(
            Level::Debug,
            Domain::Sweep,
            "state",
            obj(&[("state", v_str(self.state.as_str())), ("progress", json!(self.progress))]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_default_parameters() {
        let params = default_parameters();
        let enabled: Vec<&str> = params.iter().filter(|p| p.enabled).map(|p| p.id.as_str()).collect();
        assert_eq!(enabled, vec!["voltage", "frequency"]);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_results_within_bounds_and_sorted() {
        let mut rng = StdRng::seed_from_u64(9);
        let params = default_parameters();
        let results = generate_results(&mut rng, &params, 50, now());
        assert_eq!(results.len(), 50);
        for r in &results {
            assert_eq!(r.parameters.len(), 2);
            let v = r.parameters["voltage"];
            let f = r.parameters["frequency"];
            assert!((3.0..5.0).contains(&v));
            assert!((10.0..100.0).contains(&f));
            assert!(r.timestamp <= now());
            assert!(r.timestamp > now() - Duration::hours(24));
            let passed = r.metrics["efficiency"] > 80.0 && r.metrics["power_consumption"] < 5.0 && r.metrics["snr"] > 35.0;
            assert_eq!(r.passed, passed);
        }
        for pair in results.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn test_disabled_parameters_use_nominal_values() {
        let params: Vec<SweepParameter> = default_parameters()
            .into_iter()
            .map(|p| SweepParameter { enabled: false, ..p })
            .collect();
        let mut rng = StdRng::seed_from_u64(1);
        let results = generate_results(&mut rng, &params, 20, now());
        for r in &results {
            assert!(r.parameters.is_empty());
            // V = 3.3, f = 50: efficiency in [85, 90), power in [3.589, 5.589)
            let e = r.metrics["efficiency"];
            assert!((85.0..90.0).contains(&e));
            let p = r.metrics["power_consumption"];
            assert!(p >= 3.3 * 3.3 * 0.1 + 2.5 - 1e-9);
        }
    }

    #[test]
    fn test_best_result_first_max_wins() {
        let mk = |id: &str, eff: f64| SweepResult {
            id: id.to_string(),
            parameters: BTreeMap::new(),
            metrics: BTreeMap::from([("efficiency".to_string(), eff)]),
            timestamp: now(),
            passed: false,
        };
        let results = vec![mk("a", 70.0), mk("b", 90.0), mk("c", 90.0)];
        assert_eq!(best_result(&results, "efficiency").map(|r| r.id.as_str()), Some("b"));
        assert!(best_result(&results, "snr").is_none());
        assert!(best_result(&[], "efficiency").is_none());
    }

    #[test]
    fn test_runner_lifecycle() {
        let mut runner = SweepRunner::seeded(4, now());
        let initial = runner.results().to_vec();
        assert_eq!(initial.len(), RESULTS_PER_RUN);

        assert!(!runner.tick(now()));
        assert_eq!(runner.progress(), 0);

        assert!(runner.start());
        assert!(!runner.start());
        for _ in 0..10 {
            runner.tick(now());
        }
        assert_eq!(runner.progress(), 20);

        assert_eq!(runner.toggle_pause(), RunState::Paused);
        runner.tick(now());
        assert_eq!(runner.progress(), 20);
        assert_eq!(runner.toggle_pause(), RunState::Running);

        let mut completed = false;
        for _ in 0..40 {
            completed = runner.tick(now());
        }
        assert!(completed);
        assert_eq!(runner.state(), RunState::Idle);
        assert_eq!(runner.progress(), 0);
        assert_ne!(runner.results(), initial.as_slice());
    }

    #[test]
    fn test_runner_stop_is_idempotent() {
        let mut runner = SweepRunner::seeded(5, now());
        assert!(!runner.stop());
        assert_eq!(runner.toggle_pause(), RunState::Idle);
        runner.start();
        runner.tick(now());
        assert!(runner.stop());
        assert_eq!(runner.progress(), 0);
        assert!(!runner.stop());
    }

    #[test]
    fn test_toggling_parameter_regenerates() {
        let mut runner = SweepRunner::seeded(6, now());
        assert!(runner.set_enabled("temperature", true, now()));
        assert!(runner.results().iter().all(|r| r.parameters.contains_key("temperature")));
        assert!(!runner.set_enabled("missing", true, now()));
    }
}
