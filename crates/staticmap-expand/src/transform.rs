//! Built-in value transforms.
//!
//! A transform maps `(value, items)` to a new value, where `items` is the
//! tuple of concrete segments substituted into the pattern. Non-numeric values
//! pass through untouched.

use serde_json::{Number, Value};

use crate::hierarchy::HierarchyModel;

/// Multipliers applied by [`Transform::ScaleByRegion`].
const REGION_FACTORS: &[(&str, f64)] = &[
    ("hokkaido", 1.3),
    ("tohoku", 1.2),
    ("kanto", 1.0),
    ("chubu", 1.05),
    ("kansai", 1.1),
    ("chugoku", 1.15),
    ("shikoku", 1.2),
    ("kyushu", 1.25),
];

/// Offsets added by [`Transform::AddLatencyFactor`], in seconds.
const LATENCY_OFFSETS: &[(&str, f64)] = &[
    ("tokyo", 0.001),
    ("kanagawa", 0.0015),
    ("osaka", 0.002),
    ("kyoto", 0.0025),
    ("aichi", 0.002),
    ("fukuoka", 0.004),
    ("hokkaido", 0.006),
];

pub const DEFAULT_REGION_FACTOR: f64 = 1.0;
pub const DEFAULT_LATENCY_OFFSET: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Multiply by the factor of the first item with a known region.
    ScaleByRegion,
    /// Add the per-item offset of every item in the tuple.
    AddLatencyFactor,
}

impl Transform {
    /// Look up a transform by name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "scaleByRegion" | "scale_by_region" => Some(Transform::ScaleByRegion),
            "addLatencyFactor" | "add_latency_factor" => Some(Transform::AddLatencyFactor),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::ScaleByRegion => "scaleByRegion",
            Transform::AddLatencyFactor => "addLatencyFactor",
        }
    }

    pub fn apply(&self, value: Value, items: &[String], hierarchy: &HierarchyModel) -> Value {
        let Some(number) = value.as_f64() else {
            return value;
        };

        let result = match self {
            Transform::ScaleByRegion => {
                let factor = items
                    .iter()
                    .find_map(|item| hierarchy.region_of(item))
                    .map(region_factor)
                    .unwrap_or(DEFAULT_REGION_FACTOR);
                number * factor
            }
            Transform::AddLatencyFactor => {
                number + items.iter().map(|item| latency_offset(item)).sum::<f64>()
            }
        };

        Number::from_f64(result).map(Value::Number).unwrap_or(value)
    }
}

/// Resolve names in order, dropping the ones that are not built in.
pub fn resolve_all(names: &[String]) -> Vec<Transform> {
    names.iter().filter_map(|name| Transform::from_name(name)).collect()
}

fn region_factor(region: &str) -> f64 {
    REGION_FACTORS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, factor)| *factor)
        .unwrap_or(DEFAULT_REGION_FACTOR)
}

fn latency_offset(item: &str) -> f64 {
    LATENCY_OFFSETS
        .iter()
        .find(|(name, _)| *name == item)
        .map(|(_, offset)| *offset)
        .unwrap_or(DEFAULT_LATENCY_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn approx(value: &Value, expected: f64) -> bool {
        (value.as_f64().unwrap() - expected).abs() < 1e-12
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Transform::from_name("scaleByRegion"), Some(Transform::ScaleByRegion));
        assert_eq!(Transform::from_name("add_latency_factor"), Some(Transform::AddLatencyFactor));
        assert_eq!(Transform::from_name("explode"), None);
    }

    #[test]
    fn test_resolve_all_skips_unknown() {
        let names = items(&["explode", "addLatencyFactor"]);
        assert_eq!(resolve_all(&names), vec![Transform::AddLatencyFactor]);
    }

    #[test]
    fn test_scale_by_region() {
        let hierarchy = HierarchyModel::builtin();
        let scaled = Transform::ScaleByRegion.apply(json!(2.0), &items(&["osaka"]), &hierarchy);
        assert!(approx(&scaled, 2.2));
    }

    #[test]
    fn test_scale_by_unmapped_region() {
        let hierarchy = HierarchyModel::empty().with_prefecture("atlantis", "ocean");
        let scaled = Transform::ScaleByRegion.apply(json!(3.0), &items(&["atlantis"]), &hierarchy);
        assert!(approx(&scaled, 3.0));
    }

    #[test]
    fn test_add_latency_factor() {
        let hierarchy = HierarchyModel::builtin();
        let known = Transform::AddLatencyFactor.apply(json!(0.01), &items(&["tokyo"]), &hierarchy);
        assert!(approx(&known, 0.011));

        let unknown = Transform::AddLatencyFactor.apply(json!(0.01), &items(&["mars"]), &hierarchy);
        assert!(approx(&unknown, 0.01 + DEFAULT_LATENCY_OFFSET));
    }

    #[test]
    fn test_non_numeric_untouched() {
        let hierarchy = HierarchyModel::builtin();
        let value = json!({"timeout": 3});
        let out = Transform::ScaleByRegion.apply(value.clone(), &items(&["osaka"]), &hierarchy);
        assert_eq!(out, value);
    }
}
