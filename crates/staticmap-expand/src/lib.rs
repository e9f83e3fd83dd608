//! Hierarchical wildcard pattern expansion.
//!
//! Turns dotted patterns such as `edge.*.gateway` into concrete keys by
//! substituting wildcard segments with items drawn from a taxonomy of
//! dimensions (regions, prefectures, cities, services, roles, or any custom
//! dimension). Expansion is synchronous and memoized; the engine is meant to
//! run once at build time so that runtime lookups are plain map reads.

pub mod cache;
pub mod dimension;
pub mod engine;
pub mod hierarchy;
pub mod key;
pub mod pattern;
pub mod rule;
pub mod streaming;
pub mod transform;
pub mod wildcard;

use std::collections::BTreeMap;

pub use cache::{BoundedCache, CacheStats, DEFAULT_CACHE_SIZE};
pub use dimension::DataSource;
pub use engine::{
    ExpansionPlugin, ExpansionStream, MappingMetadata, PatternExpansionEngine, PluginContext,
    PluginError, StaticMapping,
};
pub use hierarchy::{HierarchyModel, UNASSIGNED_REGION};
pub use key::ExpansionKey;
pub use rule::{Conditions, ExpansionRule, RuleError};
pub use streaming::{ChunkStream, StreamingCompiler, StreamingConfig};
pub use transform::Transform;
pub use wildcard::{WildcardRule, WildcardRuleEngine};

/// Expanded key → value mapping. Ordered so generated artifacts are stable.
pub type Mapping = BTreeMap<String, serde_json::Value>;
