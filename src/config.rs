use anyhow::{anyhow, Result};

use crate::catalog;
use crate::sample::{default_entities, Entity};

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed seed for reproducible data; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub duration_days: u32,
    pub buffer_size: usize,
    pub tick_ms: u64,
    pub anomaly_rate: f64,
    pub anomaly_threshold: f64,
    pub align_tolerance_ms: i64,
    pub entities: Vec<Entity>,
    pub metrics: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            duration_days: 7,
            buffer_size: 100,
            tick_ms: 1000,
            anomaly_rate: 0.02,
            anomaly_threshold: 10.0,
            align_tolerance_ms: 1000,
            entities: default_entities().into_iter().take(2).collect(),
            metrics: vec!["temperature".into(), "voltage".into(), "current".into()],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            seed: std::env::var("LABSCOPE_SEED").ok().and_then(|v| v.parse().ok()),
            duration_days: std::env::var("LABSCOPE_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.duration_days),
            buffer_size: std::env::var("LABSCOPE_BUFFER").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.buffer_size),
            tick_ms: std::env::var("LABSCOPE_TICK_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.tick_ms),
            anomaly_rate: std::env::var("LABSCOPE_ANOMALY_RATE").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.anomaly_rate),
            anomaly_threshold: std::env::var("LABSCOPE_ANOMALY_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.anomaly_threshold),
            align_tolerance_ms: std::env::var("LABSCOPE_ALIGN_TOLERANCE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.align_tolerance_ms),
            entities: std::env::var("LABSCOPE_ENTITIES").ok().map(|v| parse_entities(&v)).unwrap_or(defaults.entities),
            metrics: std::env::var("LABSCOPE_METRICS").ok().map(|v| parse_list(&v)).unwrap_or(defaults.metrics),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration_days == 0 {
            return Err(anyhow!("duration_days must be at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(anyhow!("buffer_size must be at least 1"));
        }
        if self.tick_ms == 0 {
            return Err(anyhow!("tick_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&self.anomaly_rate) {
            return Err(anyhow!("anomaly_rate {} outside [0, 1]", self.anomaly_rate));
        }
        if self.align_tolerance_ms <= 0 {
            return Err(anyhow!("align_tolerance_ms must be positive"));
        }
        if self.entities.is_empty() {
            return Err(anyhow!("no entities configured"));
        }
        if let Some(unknown) = self.metrics.iter().find(|m| catalog::lookup(m).is_none()) {
            return Err(anyhow!("unknown metric: {}", unknown));
        }
        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Entities as `id` or `id=Display Name`, comma separated.
fn parse_entities(raw: &str) -> Vec<Entity> {
    let known = default_entities();
    parse_list(raw)
        .into_iter()
        .map(|item| match item.split_once('=') {
            Some((id, name)) => Entity::new(id.trim(), name.trim()),
            None => known
                .iter()
                .find(|e| e.id == item)
                .cloned()
                .unwrap_or_else(|| Entity::new(&item, &item)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_metric() {
        let mut cfg = Config::default();
        cfg.metrics.push("flux".into());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("flux"));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let cfg = Config {
            buffer_size: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_parse_entities_named_and_known() {
        let entities = parse_entities("exp-1, rig-7=Bench Rig 7, solo");
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].name, "PCB Thermal Analysis");
        assert_eq!(entities[1], Entity::new("rig-7", "Bench Rig 7"));
        assert_eq!(entities[2], Entity::new("solo", "solo"));
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(parse_list("a,, b ,"), vec!["a".to_string(), "b".to_string()]);
    }
}
