//! Expansion rules.
//!
//! A rule binds an exact pattern string to the dimension its wildcards draw
//! from, optional item filters, and an ordered list of value transforms.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dimension::DataSource;
use crate::hierarchy::HierarchyModel;
use crate::transform::{self, Transform};

/// Item filters. All present filters must admit an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// Regex an item must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,

    /// Regex an item must not match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// Region an item must belong to. Items with no region (services, roles)
    /// are not affected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Conditions {
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none() && self.region.is_none()
    }
}

/// Declarative binding from an exact pattern to a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionRule {
    pub data_source: DataSource,

    /// Advisory output template; not interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordering weight; higher expands first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,

    /// Transform names, applied in order. Unknown names are ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<String>,

    /// Per-wildcard data sources. Position `i` uses `position_sources[i]`
    /// when present, `data_source` otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub position_sources: Vec<DataSource>,
}

impl ExpansionRule {
    pub fn new(data_source: impl Into<DataSource>) -> Self {
        Self {
            data_source: data_source.into(),
            template: None,
            description: None,
            priority: None,
            conditions: Conditions::default(),
            transforms: Vec::new(),
            position_sources: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_include(mut self, regex: impl Into<String>) -> Self {
        self.conditions.include = Some(regex.into());
        self
    }

    pub fn with_exclude(mut self, regex: impl Into<String>) -> Self {
        self.conditions.exclude = Some(regex.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.conditions.region = Some(region.into());
        self
    }

    pub fn with_transform(mut self, name: impl Into<String>) -> Self {
        self.transforms.push(name.into());
        self
    }

    pub fn with_position_sources(mut self, sources: Vec<DataSource>) -> Self {
        self.position_sources = sources;
        self
    }

    /// Data source for the wildcard at `index` (0-based among wildcards).
    pub fn source_for_position(&self, index: usize) -> &DataSource {
        self.position_sources.get(index).unwrap_or(&self.data_source)
    }
}

/// Rule validation errors.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid {field} condition '{regex}': {source}")]
    InvalidCondition {
        field: &'static str,
        regex: String,
        source: regex_lite::Error,
    },

    #[error("cannot build matcher for pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex_lite::Error,
    },
}

/// A rule with its conditions compiled and transforms resolved.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: ExpansionRule,
    include: Option<Regex>,
    exclude: Option<Regex>,
    pub(crate) transforms: Vec<Transform>,
}

impl CompiledRule {
    pub(crate) fn compile(rule: ExpansionRule) -> Result<Self, RuleError> {
        let include = compile_condition("include", rule.conditions.include.as_deref())?;
        let exclude = compile_condition("exclude", rule.conditions.exclude.as_deref())?;
        let transforms = transform::resolve_all(&rule.transforms);
        Ok(Self {
            rule,
            include,
            exclude,
            transforms,
        })
    }

    /// `include ∩ ¬exclude ∩ region-match`
    pub(crate) fn admits(&self, item: &str, hierarchy: &HierarchyModel) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(item) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(item) {
                return false;
            }
        }
        if let Some(region) = &self.rule.conditions.region {
            if let Some(actual) = hierarchy.region_of(item) {
                return actual == region;
            }
        }
        true
    }
}

fn compile_condition(field: &'static str, regex: Option<&str>) -> Result<Option<Regex>, RuleError> {
    regex
        .map(|regex| {
            Regex::new(regex).map_err(|source| RuleError::InvalidCondition {
                field,
                regex: regex.to_string(),
                source,
            })
        })
        .transpose()
}
