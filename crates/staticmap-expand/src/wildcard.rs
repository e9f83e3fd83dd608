//! Base wildcard rule engine.
//!
//! Holds the dimension registry and a table of `pattern → data source`
//! rules. A wildcard pattern is expanded with the rule registered under the
//! same text, or else the first registered rule whose shape matches. Every
//! wildcard position takes items from the same dimension, so a pattern with
//! `k` wildcards over `n` items yields `n^k` keys.

use regex_lite::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::cache::{BoundedCache, CacheStats, DEFAULT_CACHE_SIZE};
use crate::dimension::DataSource;
use crate::key::ExpansionKey;
use crate::pattern;
use crate::rule::RuleError;
use crate::Mapping;

/// A registered base rule.
#[derive(Debug, Clone)]
pub struct WildcardRule {
    pattern: String,
    data_source: DataSource,
    matcher: Regex,
}

impl WildcardRule {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    /// Whether `pattern` has the same shape as this rule's pattern.
    pub fn matches(&self, pattern: &str) -> bool {
        self.matcher.is_match(pattern)
    }
}

#[derive(Debug)]
pub struct WildcardRuleEngine {
    dimensions: BTreeMap<DataSource, Vec<String>>,
    rules: Vec<WildcardRule>,
    index: HashMap<String, usize>,
    cache: BoundedCache<ExpansionKey, Mapping>,
}

impl WildcardRuleEngine {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(max_size: usize) -> Self {
        Self {
            dimensions: BTreeMap::new(),
            rules: Vec::new(),
            index: HashMap::new(),
            cache: BoundedCache::new(max_size),
        }
    }

    /// Register or replace a dimension. Cached expansions are dropped.
    pub fn register_dimension(&mut self, source: impl Into<DataSource>, items: Vec<String>) {
        let source = source.into();
        debug!(dimension = %source, items = items.len(), "registered dimension");
        self.dimensions.insert(source, items);
        self.cache.clear();
    }

    pub fn dimension(&self, source: &DataSource) -> Option<&[String]> {
        self.dimensions.get(source).map(Vec::as_slice)
    }

    pub fn dimension_names(&self) -> impl Iterator<Item = &DataSource> {
        self.dimensions.keys()
    }

    /// Register a rule. Re-registering a pattern replaces the rule in place,
    /// keeping its position in match order.
    pub fn register_rule(
        &mut self,
        pattern: &str,
        data_source: impl Into<DataSource>,
    ) -> Result<(), RuleError> {
        let matcher = pattern::to_regex(pattern).map_err(|source| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let rule = WildcardRule {
            pattern: pattern.to_string(),
            data_source: data_source.into(),
            matcher,
        };

        match self.index.get(pattern) {
            Some(&slot) => self.rules[slot] = rule,
            None => {
                self.index.insert(pattern.to_string(), self.rules.len());
                self.rules.push(rule);
            }
        }
        self.cache.clear();
        Ok(())
    }

    pub fn rules(&self) -> &[WildcardRule] {
        &self.rules
    }

    /// Exact rule for `pattern`, else the first registered rule whose shape
    /// matches it.
    pub fn find_matching_rule(&self, pattern: &str) -> Option<&WildcardRule> {
        if let Some(&slot) = self.index.get(pattern) {
            return self.rules.get(slot);
        }
        self.rules.iter().find(|rule| rule.matches(pattern))
    }

    /// Expand one pattern without touching the cache.
    ///
    /// Patterns without a wildcard, patterns no rule matches, and rules
    /// naming an unregistered dimension all pass through as `{pattern: value}`.
    pub fn expand_pattern(&self, pattern: &str, value: &Value) -> Mapping {
        if !pattern::has_wildcard(pattern) {
            return pattern::identity(pattern, value);
        }

        let Some(rule) = self.find_matching_rule(pattern) else {
            debug!(pattern, "no rule matches; passing through");
            return pattern::identity(pattern, value);
        };

        match self.dimension(&rule.data_source) {
            Some(items) => Self::expand_with_template(pattern, value, items),
            None => {
                warn!(
                    pattern,
                    rule = %rule.pattern,
                    data_source = %rule.data_source,
                    "unknown data source; passing pattern through"
                );
                pattern::identity(pattern, value)
            }
        }
    }

    /// Substitute `items` into every wildcard of `pattern`.
    ///
    /// One wildcard yields one key per item; several wildcards yield the
    /// cartesian power of `items`. Every key carries `value` unchanged.
    pub fn expand_with_template(pattern: &str, value: &Value, items: &[String]) -> Mapping {
        let positions = pattern::wildcard_positions(pattern);
        if positions.is_empty() {
            return pattern::identity(pattern, value);
        }

        let lists = vec![items.to_vec(); positions.len()];
        pattern::cartesian(&lists)
            .into_iter()
            .map(|combo| (pattern::fill(pattern, &positions, &combo), value.clone()))
            .collect()
    }

    /// Expand every pattern, memoizing per `(pattern, value)`.
    pub fn compile_patterns(&mut self, patterns: &Mapping) -> Mapping {
        let mut compiled = Mapping::new();
        for (pattern, value) in patterns {
            let key = ExpansionKey::new(pattern, value);
            if let Some(cached) = self.cache.get(&key) {
                compiled.extend(cached.iter().map(|(k, v)| (k.clone(), v.clone())));
                continue;
            }
            let expanded = self.expand_pattern(pattern, value);
            compiled.extend(expanded.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.cache.set(key, expanded);
        }
        compiled
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for WildcardRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
