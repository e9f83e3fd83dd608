//! Hierarchical pattern expansion engine.
//!
//! Expansion of a single `(pattern, value)` resolves in tiers:
//!
//! 1. An installed [`ExpansionPlugin`] may supply the whole expansion.
//! 2. A memoized result for the same pattern and structurally equal value.
//! 3. No wildcard: the pattern maps to itself.
//! 4. A rule registered under the exact pattern text: hierarchical expansion
//!    with condition filters and transforms.
//! 5. The base engine's shape match, expanding with the canonical cartesian
//!    power of one dimension.
//! 6. Otherwise the pattern maps to itself.
//!
//! Replacing the hierarchy bumps its version and drops every memoized result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{BoundedCache, CacheStats, DEFAULT_CACHE_SIZE};
use crate::dimension::DataSource;
use crate::hierarchy::HierarchyModel;
use crate::key::ExpansionKey;
use crate::pattern;
use crate::rule::{CompiledRule, ExpansionRule, RuleError};
use crate::wildcard::WildcardRuleEngine;
use crate::Mapping;

/// Rules for the standard wildcard shapes of the taxonomy. Registered on every
/// hierarchy replacement unless a rule with the same pattern already exists.
pub fn default_rules() -> Vec<(&'static str, ExpansionRule)> {
    vec![
        (
            "edge.*.gateway",
            ExpansionRule::new(DataSource::Prefectures)
                .with_description("Edge gateway per prefecture"),
        ),
        (
            "region.*.latency",
            ExpansionRule::new(DataSource::Regions)
                .with_description("Regional latency baseline")
                .with_transform("scaleByRegion"),
        ),
        (
            "city.*.cache",
            ExpansionRule::new(DataSource::Cities).with_description("City-level cache tier"),
        ),
        (
            "service.*.time",
            ExpansionRule::new(DataSource::Services).with_description("Per-service time"),
        ),
        (
            "cluster.*.*",
            ExpansionRule::new(DataSource::Services)
                .with_description("Service cluster members by role")
                .with_position_sources(vec![DataSource::Services, DataSource::Roles]),
        ),
    ]
}

/// What a plugin sees for one pattern.
pub struct PluginContext<'a> {
    pub value: &'a Value,
    pub hierarchy: &'a HierarchyModel,
}

#[derive(Debug, Error)]
#[error("plugin failed: {0}")]
pub struct PluginError(pub String);

/// Optional hook that may replace the built-in expansion of a pattern.
///
/// Returning `Ok(None)`, an empty map, or exactly `{pattern: value}` defers
/// to the engine. Errors also defer; they are logged, never propagated.
pub trait ExpansionPlugin {
    fn name(&self) -> &str;

    fn expand(
        &self,
        pattern: &str,
        context: &PluginContext<'_>,
    ) -> Result<Option<Mapping>, PluginError>;
}

/// Summary attached to a compiled mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingMetadata {
    pub pattern_count: usize,
    pub wildcard_pattern_count: usize,
    pub expanded_key_count: usize,
    pub rule_count: usize,
    pub hierarchy_version: u64,
}

/// Fully expanded mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticMapping {
    /// Reserved for literal overrides; the engine leaves it empty.
    pub direct_mapping: Mapping,
    pub component_mapping: Mapping,
    pub metadata: MappingMetadata,
}

impl StaticMapping {
    /// Merge an expanded chunk. Keys already present win, matching the
    /// first-yielded-wins rule of [`PatternExpansionEngine::compile_to_static_mapping`].
    pub fn merge_chunk(&mut self, chunk: Mapping) {
        for (key, value) in chunk {
            self.component_mapping.entry(key).or_insert(value);
        }
        self.metadata.expanded_key_count = self.component_mapping.len();
    }
}

pub struct PatternExpansionEngine {
    hierarchy: HierarchyModel,
    hierarchy_version: u64,
    rules: HashMap<String, CompiledRule>,
    base: WildcardRuleEngine,
    cache: BoundedCache<ExpansionKey, Mapping>,
    plugin: Option<Box<dyn ExpansionPlugin>>,
}

impl PatternExpansionEngine {
    /// Engine over the built-in taxonomy.
    pub fn new() -> Self {
        Self::with_hierarchy(HierarchyModel::default())
    }

    pub fn with_hierarchy(hierarchy: HierarchyModel) -> Self {
        let mut engine = Self {
            hierarchy: HierarchyModel::empty(),
            hierarchy_version: 0,
            rules: HashMap::new(),
            base: WildcardRuleEngine::new(),
            cache: BoundedCache::new(DEFAULT_CACHE_SIZE),
            plugin: None,
        };
        engine.set_hierarchy(hierarchy);
        engine
    }

    pub fn with_cache_size(mut self, max_size: usize) -> Self {
        self.cache = BoundedCache::new(max_size);
        self
    }

    pub fn with_plugin(mut self, plugin: Box<dyn ExpansionPlugin>) -> Self {
        self.plugin = Some(plugin);
        self
    }

    pub fn set_plugin(&mut self, plugin: Option<Box<dyn ExpansionPlugin>>) {
        self.plugin = plugin;
        self.cache.clear();
    }

    pub fn hierarchy(&self) -> &HierarchyModel {
        &self.hierarchy
    }

    pub fn hierarchy_version(&self) -> u64 {
        self.hierarchy_version
    }

    /// Replace the hierarchy wholesale.
    ///
    /// Rebuilds the taxonomy dimensions on the base engine (custom dimensions
    /// are kept), drops every memoized expansion, and re-registers the
    /// default rules.
    pub fn set_hierarchy(&mut self, hierarchy: HierarchyModel) {
        for source in DataSource::STANDARD {
            if let Some(items) = hierarchy.items(&source) {
                self.base.register_dimension(source, items);
            }
        }
        self.hierarchy = hierarchy;
        self.hierarchy_version += 1;
        self.cache.clear();
        self.register_default_rules();
        debug!(version = self.hierarchy_version, "hierarchy replaced");
    }

    /// Register a custom dimension usable as a rule data source.
    pub fn register_dimension(&mut self, name: impl Into<DataSource>, items: Vec<String>) {
        self.base.register_dimension(name, items);
        self.cache.clear();
    }

    /// Upsert a rule under its exact pattern text.
    ///
    /// Condition regexes are compiled here, so a malformed rule is rejected
    /// before any expansion runs.
    pub fn add_rule(&mut self, pattern: impl Into<String>, rule: ExpansionRule) -> Result<(), RuleError> {
        let pattern = pattern.into();
        let compiled = CompiledRule::compile(rule)?;
        self.base
            .register_rule(&pattern, compiled.rule.data_source.clone())?;
        self.rules.insert(pattern, compiled);
        self.cache.clear();
        Ok(())
    }

    pub fn rule(&self, pattern: &str) -> Option<&ExpansionRule> {
        self.rules.get(pattern).map(|compiled| &compiled.rule)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn base_engine(&self) -> &WildcardRuleEngine {
        &self.base
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every memoized expansion.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Ordering weight: the exact rule's explicit priority, else
    /// `(segments - wildcards) * 100`.
    pub fn priority_of(&self, pattern: &str) -> i64 {
        self.rules
            .get(pattern)
            .and_then(|compiled| compiled.rule.priority)
            .unwrap_or_else(|| pattern::concreteness(pattern))
    }

    /// Stable sort, highest priority first.
    pub fn sort_by_priority(&self, mut patterns: Vec<(String, Value)>) -> Vec<(String, Value)> {
        patterns.sort_by_key(|(pattern, _)| std::cmp::Reverse(self.priority_of(pattern)));
        patterns
    }

    /// Lazily expand `patterns` in priority order.
    ///
    /// Each pattern is expanded only when the previous one's keys have been
    /// consumed. The stream is single-pass.
    pub fn expand_stream<I>(&mut self, patterns: I) -> ExpansionStream<'_>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let ordered = self.sort_by_priority(patterns.into_iter().collect());
        ExpansionStream {
            engine: self,
            pending: ordered.into_iter(),
            current: Mapping::new().into_iter(),
        }
    }

    /// Drain the stream into a [`StaticMapping`].
    ///
    /// When two patterns produce the same key, the one yielded first (higher
    /// priority) wins. Memory is proportional to the expanded size.
    pub fn compile_to_static_mapping<I>(&mut self, patterns: I) -> StaticMapping
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let patterns: Vec<(String, Value)> = patterns.into_iter().collect();
        let pattern_count = patterns.len();
        let wildcard_pattern_count = patterns
            .iter()
            .filter(|(pattern, _)| pattern::has_wildcard(pattern))
            .count();

        let mut component_mapping = Mapping::new();
        for (key, value) in self.expand_stream(patterns) {
            component_mapping.entry(key).or_insert(value);
        }

        StaticMapping {
            direct_mapping: Mapping::new(),
            metadata: MappingMetadata {
                pattern_count,
                wildcard_pattern_count,
                expanded_key_count: component_mapping.len(),
                rule_count: self.rules.len(),
                hierarchy_version: self.hierarchy_version,
            },
            component_mapping,
        }
    }

    /// Expand a single pattern through all resolution tiers.
    pub fn expand_pattern(&mut self, pattern: &str, value: &Value) -> Mapping {
        if let Some(delegated) = self.delegate(pattern, value) {
            return delegated;
        }

        let key = ExpansionKey::new(pattern, value);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let expanded = self.compute(pattern, value);
        self.cache.set(key, expanded.clone());
        expanded
    }

    fn delegate(&self, pattern: &str, value: &Value) -> Option<Mapping> {
        let plugin = self.plugin.as_ref()?;
        let context = PluginContext {
            value,
            hierarchy: &self.hierarchy,
        };
        match plugin.expand(pattern, &context) {
            Ok(Some(mapping)) if !is_trivial(&mapping, pattern, value) => Some(mapping),
            Ok(_) => None,
            Err(err) => {
                debug!(plugin = plugin.name(), pattern, error = %err, "plugin failed; using built-in expansion");
                None
            }
        }
    }

    fn compute(&self, pattern: &str, value: &Value) -> Mapping {
        let positions = pattern::wildcard_positions(pattern);
        if positions.is_empty() {
            return pattern::identity(pattern, value);
        }
        match self.rules.get(pattern) {
            Some(compiled) => self.expand_hierarchical(pattern, value, &positions, compiled),
            None => self.base.expand_pattern(pattern, value),
        }
    }

    fn expand_hierarchical(
        &self,
        pattern: &str,
        value: &Value,
        positions: &[usize],
        compiled: &CompiledRule,
    ) -> Mapping {
        let mut lists: Vec<Vec<String>> = Vec::with_capacity(positions.len());
        for index in 0..positions.len() {
            let source = compiled.rule.source_for_position(index);
            let Some(items) = self.base.dimension(source) else {
                warn!(pattern, data_source = %source, "unknown data source; passing pattern through");
                return pattern::identity(pattern, value);
            };
            lists.push(
                items
                    .iter()
                    .filter(|item| compiled.admits(item, &self.hierarchy))
                    .cloned()
                    .collect(),
            );
        }

        pattern::cartesian(&lists)
            .into_iter()
            .map(|combo| {
                let transformed = compiled
                    .transforms
                    .iter()
                    .fold(value.clone(), |acc, transform| {
                        transform.apply(acc, &combo, &self.hierarchy)
                    });
                (pattern::fill(pattern, positions, &combo), transformed)
            })
            .collect()
    }

    fn register_default_rules(&mut self) {
        for (pattern, rule) in default_rules() {
            if self.rules.contains_key(pattern) {
                continue;
            }
            if let Err(err) = self.add_rule(pattern, rule) {
                warn!(pattern, error = %err, "skipping default rule");
            }
        }
    }
}

impl Default for PatternExpansionEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_trivial(mapping: &Mapping, pattern: &str, value: &Value) -> bool {
    mapping.is_empty() || (mapping.len() == 1 && mapping.get(pattern) == Some(value))
}

/// Lazy `(key, value)` stream produced by [`PatternExpansionEngine::expand_stream`].
pub struct ExpansionStream<'e> {
    engine: &'e mut PatternExpansionEngine,
    pending: std::vec::IntoIter<(String, Value)>,
    current: std::collections::btree_map::IntoIter<String, Value>,
}

impl ExpansionStream<'_> {
    /// Patterns not yet expanded.
    pub fn remaining_patterns(&self) -> usize {
        self.pending.len()
    }
}

impl Iterator for ExpansionStream<'_> {
    type Item = (String, Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }
            let (pattern, value) = self.pending.next()?;
            self.current = self.engine.expand_pattern(&pattern, &value).into_iter();
        }
    }
}
