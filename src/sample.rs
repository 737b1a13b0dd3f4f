//! Core data model: samples and the entities (experiments) that own them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Test condition tag attached by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Normal,
    Stress,
    Optimal,
}

impl Condition {
    /// Conditions rotate normal -> stress -> optimal by sample index.
    pub fn for_index(i: usize) -> Self {
        match i % 3 {
            0 => Condition::Normal,
            1 => Condition::Stress,
            _ => Condition::Optimal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Normal => "normal",
            Condition::Stress => "stress",
            Condition::Optimal => "optimal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMeta {
    pub test_run: u32,
    pub condition: Condition,
    pub is_anomaly: bool,
}

/// One (entity, metric, value, timestamp) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub entity_id: String,
    pub metric: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SampleMeta>,
}

impl Sample {
    pub fn is_anomaly(&self) -> bool {
        self.meta.map(|m| m.is_anomaly).unwrap_or(false)
    }

    pub fn condition(&self) -> Option<Condition> {
        self.meta.map(|m| m.condition)
    }
}

/// An experiment the samples belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
}

impl Entity {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Display name for an entity id, falling back to the id when unknown.
pub fn entity_name<'a>(entities: &'a [Entity], id: &'a str) -> &'a str {
    entities
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.name.as_str())
        .unwrap_or(id)
}

/// The demo experiment set shown when nothing else is configured.
pub fn default_entities() -> Vec<Entity> {
    vec![
        Entity::new("exp-1", "PCB Thermal Analysis"),
        Entity::new("exp-2", "Battery Life Optimization"),
        Entity::new("exp-3", "Signal Integrity Test"),
        Entity::new("exp-4", "EMI Compliance Testing"),
        Entity::new("exp-5", "Wireless Range Testing"),
    ]
}
