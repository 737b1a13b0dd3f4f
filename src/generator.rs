//! Synthetic data generation.
//!
//! Produces hourly samples per (entity, metric) with a baseline, a linear
//! drift, a cyclic component, uniform noise and rare injected anomalies.
//! The random source is injected so tests can pin a seed.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalog;
use crate::compare::{ComparisonEntry, ComparisonTable, EntityComparison};
use crate::logging::log_generation;
use crate::sample::{Condition, Sample, SampleMeta};
use crate::stats::Direction;
use crate::stream::LiveReading;

/// Shape of the synthetic signal.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub baseline: f64,
    /// Added to the baseline per entity index
    pub baseline_step: f64,
    /// Per-hour drift; even entities drift up, odd entities drift down
    pub trend_per_hour: f64,
    pub cycle_amplitude: f64,
    pub cycle_rate: f64,
    /// Full width of the uniform noise band
    pub noise_amplitude: f64,
    pub anomaly_rate: f64,
    /// Full width of the anomaly perturbation band
    pub anomaly_amplitude: f64,
    /// A perturbation larger than this (absolute) flags the sample
    pub anomaly_threshold: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            baseline: 50.0,
            baseline_step: 10.0,
            trend_per_hour: 0.1,
            cycle_amplitude: 5.0,
            cycle_rate: 0.1,
            noise_amplitude: 8.0,
            anomaly_rate: 0.02,
            anomaly_amplitude: 30.0,
            anomaly_threshold: 10.0,
        }
    }
}

impl GeneratorConfig {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self {
            anomaly_rate: cfg.anomaly_rate,
            anomaly_threshold: cfg.anomaly_threshold,
            ..Self::default()
        }
    }
}

pub struct PointGenerator<R: Rng = StdRng> {
    cfg: GeneratorConfig,
    rng: R,
}

impl PointGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(GeneratorConfig::default(), StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(GeneratorConfig::default(), StdRng::from_entropy())
    }

    /// Seeded when the config pins a seed, entropy otherwise.
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(GeneratorConfig::from_config(cfg), rng)
    }
}

impl<R: Rng> PointGenerator<R> {
    pub fn with_rng(cfg: GeneratorConfig, rng: R) -> Self {
        Self { cfg, rng }
    }

    /// Centered uniform draw in `[-width/2, width/2)`.
    fn centered(&mut self, width: f64) -> f64 {
        (self.rng.gen::<f64>() - 0.5) * width
    }

    /// One sample per hour for each (entity, metric) pair, ending one hour
    /// before `now`.
    pub fn generate<E, M>(&mut self, entity_ids: &[E], metrics: &[M], duration_days: u32, now: DateTime<Utc>) -> Vec<Sample>
    where
        E: AsRef<str>,
        M: AsRef<str>,
    {
        let hours = duration_days as usize * 24;
        let mut out = Vec::with_capacity(entity_ids.len() * metrics.len() * hours);
        let mut anomalies = 0usize;

        for (entity_idx, entity) in entity_ids.iter().enumerate() {
            let entity = entity.as_ref();
            let baseline = self.cfg.baseline + entity_idx as f64 * self.cfg.baseline_step;
            let sign = if entity_idx % 2 == 0 { 1.0 } else { -1.0 };
            let trend = sign * self.cfg.trend_per_hour;

            for metric in metrics {
                let metric = metric.as_ref();
                let unit = catalog::unit_of(metric);
                for i in 0..hours {
                    let timestamp = now - Duration::hours((hours - i) as i64);
                    let trend_value = trend * i as f64;
                    let cyclic = (i as f64 * self.cfg.cycle_rate).sin() * self.cfg.cycle_amplitude;
                    let noise = self.centered(self.cfg.noise_amplitude);
                    let anomaly = if self.rng.gen::<f64>() < self.cfg.anomaly_rate {
                        self.centered(self.cfg.anomaly_amplitude)
                    } else {
                        0.0
                    };
                    let is_anomaly = anomaly.abs() > self.cfg.anomaly_threshold;
                    if is_anomaly {
                        anomalies += 1;
                    }

                    out.push(Sample {
                        id: format!("{}-{}-{}", entity, metric, i),
                        entity_id: entity.to_string(),
                        metric: metric.to_string(),
                        value: (baseline + trend_value + cyclic + noise + anomaly).max(0.0),
                        unit: unit.to_string(),
                        timestamp,
                        meta: Some(SampleMeta {
                            test_run: (i / 24) as u32 + 1,
                            condition: Condition::for_index(i),
                            is_anomaly,
                        }),
                    });
                }
            }
        }

        log_generation(entity_ids.len(), metrics.len(), duration_days, out.len(), anomalies);
        out
    }

    /// Synthetic per-entity scalar performance values for the comparison view.
    pub fn generate_comparison<E, M>(&mut self, entity_ids: &[E], metrics: &[M]) -> ComparisonTable
    where
        E: AsRef<str>,
        M: AsRef<str>,
    {
        let mut entities = Vec::with_capacity(entity_ids.len());
        for (idx, entity) in entity_ids.iter().enumerate() {
            let mut row = EntityComparison::new(entity.as_ref());
            for metric in metrics {
                let base = 50.0 + idx as f64 * 15.0 + self.centered(20.0);
                let performance = 70.0 + idx as f64 * 10.0 + self.centered(30.0);
                let trend = if self.rng.gen::<f64>() > 0.5 { Direction::Up } else { Direction::Down };
                let change_pct = self.centered(20.0);
                let stability = 85.0 + self.rng.gen::<f64>() * 15.0;
                let samples = 100 + (self.rng.gen::<f64>() * 200.0).floor() as u32;
                row.metrics.insert(
                    metric.as_ref().to_string(),
                    ComparisonEntry {
                        current: base.max(0.0),
                        target: base * 1.2,
                        performance: performance.clamp(0.0, 100.0),
                        trend,
                        change_pct,
                        stability,
                        samples,
                    },
                );
            }
            entities.push(row);
        }
        ComparisonTable { entities }
    }

    /// Next point of the live telemetry random walk, one second after
    /// `previous` (or at `now` when starting fresh).
    pub fn next_live_reading(&mut self, previous: Option<&LiveReading>, now: DateTime<Utc>) -> LiveReading {
        let timestamp = previous
            .map(|p| p.timestamp + Duration::seconds(1))
            .unwrap_or(now);
        let voltage = match previous {
            Some(p) => (p.voltage + self.centered(0.1)).clamp(2.5, 4.0),
            None => 3.3 + self.centered(0.2),
        };
        let frequency = match previous {
            Some(p) => (p.frequency + self.centered(2.0)).clamp(40.0, 60.0),
            None => 50.0 + self.centered(5.0),
        };
        let current = 80.0 + voltage * 20.0 + frequency * 0.5 + self.rng.gen::<f64>() * 20.0;
        let power = voltage * current / 1000.0;
        let temperature = 25.0 + power * 15.0 + self.rng.gen::<f64>() * 5.0;
        let efficiency = (90.0 - (voltage - 3.3).abs() * 10.0 - (frequency - 50.0).abs() * 0.3
            + self.rng.gen::<f64>() * 5.0)
            .clamp(0.0, 100.0);
        let snr = (45.0 - (temperature - 25.0) * 0.2 + voltage.log10() * 5.0 + self.rng.gen::<f64>() * 3.0).max(0.0);

        LiveReading {
            timestamp,
            voltage: round_to(voltage, 2),
            current: round_to(current, 1),
            temperature: round_to(temperature, 1),
            frequency: round_to(frequency, 1),
            efficiency: round_to(efficiency, 1),
            power: round_to(power, 3),
            snr: round_to(snr, 1),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_generate_counts_and_spacing() {
        let mut gen = PointGenerator::seeded(7);
        let samples = gen.generate(&["a", "b"], &["voltage", "current", "power"], 2, fixed_now());
        assert_eq!(samples.len(), 2 * 3 * 48);

        let first = &samples[0];
        assert_eq!(first.id, "a-voltage-0");
        assert_eq!(first.unit, "V");
        assert_eq!(first.timestamp, fixed_now() - Duration::hours(48));
        assert_eq!(samples[47].timestamp, fixed_now() - Duration::hours(1));
        assert_eq!(samples[1].timestamp - samples[0].timestamp, Duration::hours(1));
    }

    #[test]
    fn test_generate_values_non_negative_and_meta() {
        let mut gen = PointGenerator::seeded(11);
        let samples = gen.generate(&["a", "b", "c"], &["temperature"], 3, fixed_now());
        for (i, s) in samples.iter().enumerate() {
            assert!(s.value >= 0.0);
            let meta = s.meta.expect("generated samples carry meta");
            let hour = i % 72;
            assert_eq!(meta.test_run, (hour / 24) as u32 + 1);
            assert_eq!(meta.condition, Condition::for_index(hour));
        }
    }

    #[test]
    fn test_generate_is_reproducible_with_seed() {
        let a = PointGenerator::seeded(42).generate(&["x"], &["noise"], 1, fixed_now());
        let b = PointGenerator::seeded(42).generate(&["x"], &["noise"], 1, fixed_now());
        assert_eq!(a, b);
        let c = PointGenerator::seeded(43).generate(&["x"], &["noise"], 1, fixed_now());
        assert_ne!(a, c);
    }

    #[test]
    fn test_entity_trend_sign_alternates() {
        // Without noise or cycle the drift is the only moving part.
        let cfg = GeneratorConfig {
            cycle_amplitude: 0.0,
            noise_amplitude: 0.0,
            anomaly_rate: 0.0,
            ..GeneratorConfig::default()
        };
        let mut gen = PointGenerator::with_rng(cfg, StdRng::seed_from_u64(1));
        let samples = gen.generate(&["up", "down"], &["voltage"], 1, fixed_now());
        let up: Vec<f64> = samples.iter().filter(|s| s.entity_id == "up").map(|s| s.value).collect();
        let down: Vec<f64> = samples.iter().filter(|s| s.entity_id == "down").map(|s| s.value).collect();
        assert!((up[0] - 50.0).abs() < 1e-9);
        assert!((down[0] - 60.0).abs() < 1e-9);
        assert!(up[23] > up[0]);
        assert!(down[23] < down[0]);
        assert!(samples.iter().all(|s| !s.is_anomaly()));
    }

    #[test]
    fn test_anomaly_flag_follows_threshold() {
        let cfg = GeneratorConfig {
            anomaly_rate: 1.0,
            anomaly_threshold: 0.0,
            ..GeneratorConfig::default()
        };
        let mut gen = PointGenerator::with_rng(cfg, StdRng::seed_from_u64(3));
        let samples = gen.generate(&["a"], &["current"], 1, fixed_now());
        // Every sample is perturbed; only an exactly-zero draw escapes the flag.
        let flagged = samples.iter().filter(|s| s.is_anomaly()).count();
        assert!(flagged >= 23);
    }

    #[test]
    fn test_comparison_ranges() {
        let mut gen = PointGenerator::seeded(5);
        let table = gen.generate_comparison(&["a", "b", "c"], &["voltage", "efficiency"]);
        assert_eq!(table.entities.len(), 3);
        for row in &table.entities {
            assert_eq!(row.metrics.len(), 2);
            for entry in row.metrics.values() {
                assert!(entry.current >= 0.0);
                assert!((0.0..=100.0).contains(&entry.performance));
                assert!((85.0..=100.0).contains(&entry.stability));
                assert!((100..300).contains(&entry.samples));
                assert!(entry.change_pct.abs() <= 10.0);
            }
        }
    }

    #[test]
    fn test_live_walk_stays_in_bounds() {
        let mut gen = PointGenerator::seeded(9);
        let mut prev: Option<LiveReading> = None;
        for _ in 0..500 {
            let next = gen.next_live_reading(prev.as_ref(), fixed_now());
            assert!((2.5..=4.0).contains(&next.voltage));
            assert!((40.0..=60.0).contains(&next.frequency));
            assert!((0.0..=100.0).contains(&next.efficiency));
            assert!(next.snr >= 0.0);
            if let Some(p) = &prev {
                assert_eq!(next.timestamp - p.timestamp, Duration::seconds(1));
            }
            prev = Some(next);
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.71828, 3), 2.718);
    }
}
