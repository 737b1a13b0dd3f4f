//! Sample filters applied before reshaping.
//!
//! Enabled filters are ANDed in order; disabled filters pass everything.
//! A filter whose value does not fit its operator matches nothing.

use serde::{Deserialize, Serialize};

use crate::sample::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    Greater,
    Less,
    Between,
    Contains,
}

/// Which part of a sample the filter inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterField {
    #[default]
    Value,
    Metric,
    Entity,
    Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFilter {
    pub id: String,
    #[serde(default)]
    pub field: FilterField,
    pub operator: FilterOperator,
    pub value: FilterValue,
    pub enabled: bool,
}

impl DataFilter {
    pub fn new(id: &str, field: FilterField, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            id: id.to_string(),
            field,
            operator,
            value,
            enabled: true,
        }
    }

    pub fn greater(id: &str, x: f64) -> Self {
        Self::new(id, FilterField::Value, FilterOperator::Greater, FilterValue::Number(x))
    }

    pub fn less(id: &str, x: f64) -> Self {
        Self::new(id, FilterField::Value, FilterOperator::Less, FilterValue::Number(x))
    }

    pub fn between(id: &str, lo: f64, hi: f64) -> Self {
        Self::new(id, FilterField::Value, FilterOperator::Between, FilterValue::List(vec![lo, hi]))
    }

    pub fn equals(id: &str, x: f64) -> Self {
        Self::new(id, FilterField::Value, FilterOperator::Equals, FilterValue::Number(x))
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        if !self.enabled {
            return true;
        }
        match self.field {
            FilterField::Value => self.matches_number(sample.value),
            FilterField::Metric => self.matches_text(Some(sample.metric.as_str())),
            FilterField::Entity => self.matches_text(Some(sample.entity_id.as_str())),
            FilterField::Condition => self.matches_text(sample.condition().map(|c| c.as_str())),
        }
    }

    fn matches_number(&self, v: f64) -> bool {
        match (self.operator, &self.value) {
            (FilterOperator::Greater, FilterValue::Number(x)) => v > *x,
            (FilterOperator::Less, FilterValue::Number(x)) => v < *x,
            (FilterOperator::Equals, FilterValue::Number(x)) => v == *x,
            (FilterOperator::Between, FilterValue::List(bounds)) => match bounds.as_slice() {
                [lo, hi] => v >= *lo && v <= *hi,
                _ => false,
            },
            _ => false,
        }
    }

    fn matches_text(&self, field: Option<&str>) -> bool {
        let (Some(field), FilterValue::Text(needle)) = (field, &self.value) else {
            return false;
        };
        match self.operator {
            FilterOperator::Equals => field == needle.as_str(),
            FilterOperator::Contains => field.contains(needle.as_str()),
            _ => false,
        }
    }
}

/// Samples that pass every enabled filter, in input order.
pub fn apply_filters<'a>(samples: &'a [Sample], filters: &[DataFilter]) -> Vec<&'a Sample> {
    samples
        .iter()
        .filter(|s| filters.iter().all(|f| f.matches(s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Condition, SampleMeta};
    use chrono::Utc;

    fn sample(metric: &str, value: f64) -> Sample {
        Sample {
            id: format!("{}-{}", metric, value),
            entity_id: "exp-1".to_string(),
            metric: metric.to_string(),
            value,
            unit: String::new(),
            timestamp: Utc::now(),
            meta: Some(SampleMeta {
                test_run: 1,
                condition: Condition::Stress,
                is_anomaly: false,
            }),
        }
    }

    fn values(samples: &[&Sample]) -> Vec<f64> {
        samples.iter().map(|s| s.value).collect()
    }

    fn fixture() -> Vec<Sample> {
        [1.0, 5.0, 10.0, 15.0].iter().map(|v| sample("voltage", *v)).collect()
    }

    #[test]
    fn test_between_is_inclusive() {
        let data = fixture();
        let kept = apply_filters(&data, &[DataFilter::between("f", 5.0, 10.0)]);
        assert_eq!(values(&kept), vec![5.0, 10.0]);
    }

    #[test]
    fn test_greater_less_equals() {
        let data = fixture();
        assert_eq!(values(&apply_filters(&data, &[DataFilter::greater("f", 5.0)])), vec![10.0, 15.0]);
        assert_eq!(values(&apply_filters(&data, &[DataFilter::less("f", 5.0)])), vec![1.0]);
        assert_eq!(values(&apply_filters(&data, &[DataFilter::equals("f", 15.0)])), vec![15.0]);
    }

    #[test]
    fn test_filters_are_anded_and_disabled_skipped() {
        let data = fixture();
        let filters = [
            DataFilter::greater("a", 1.0),
            DataFilter::less("b", 15.0),
            DataFilter::equals("c", 999.0).disabled(),
        ];
        assert_eq!(values(&apply_filters(&data, &filters)), vec![5.0, 10.0]);
    }

    #[test]
    fn test_malformed_between_matches_nothing() {
        let data = fixture();
        let one_bound = DataFilter::new("f", FilterField::Value, FilterOperator::Between, FilterValue::List(vec![5.0]));
        assert!(apply_filters(&data, &[one_bound]).is_empty());
        let scalar = DataFilter::new("f", FilterField::Value, FilterOperator::Between, FilterValue::Number(5.0));
        assert!(apply_filters(&data, &[scalar]).is_empty());
        let text = DataFilter::new("f", FilterField::Value, FilterOperator::Greater, FilterValue::Text("5".into()));
        assert!(apply_filters(&data, &[text]).is_empty());
    }

    #[test]
    fn test_text_fields() {
        let data = vec![sample("voltage", 1.0), sample("current", 2.0)];
        let contains = DataFilter::new("f", FilterField::Metric, FilterOperator::Contains, FilterValue::Text("volt".into()));
        assert_eq!(values(&apply_filters(&data, &[contains])), vec![1.0]);

        let cond = DataFilter::new("f", FilterField::Condition, FilterOperator::Equals, FilterValue::Text("stress".into()));
        assert_eq!(apply_filters(&data, &[cond]).len(), 2);

        let numeric_on_text = DataFilter::new("f", FilterField::Entity, FilterOperator::Greater, FilterValue::Number(1.0));
        assert!(apply_filters(&data, &[numeric_on_text]).is_empty());
    }

    #[test]
    fn test_deserialize_from_json() {
        let raw = r#"{"id":"f1","operator":"between","value":[5,10],"enabled":true}"#;
        let filter: DataFilter = serde_json::from_str(raw).unwrap();
        assert_eq!(filter.field, FilterField::Value);
        assert_eq!(filter.value, FilterValue::List(vec![5.0, 10.0]));

        let raw = r#"{"id":"f2","field":"entity","operator":"contains","value":"exp","enabled":false}"#;
        let filter: DataFilter = serde_json::from_str(raw).unwrap();
        assert_eq!(filter.value, FilterValue::Text("exp".into()));
        assert!(!filter.enabled);
    }
}
