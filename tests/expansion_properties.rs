//! Expansion property tests
//!
//! Behavioral properties of the expansion engine exercised through the
//! public API: identity, completeness, cardinality, condition filters,
//! caching, and chunked equivalence.

use serde_json::{json, Value};
use staticmap::expand::{
    BoundedCache, DataSource, ExpansionPlugin, ExpansionRule, HierarchyModel, Mapping,
    PatternExpansionEngine, PluginContext, PluginError, StreamingCompiler, StreamingConfig,
};

fn scenario_engine() -> PatternExpansionEngine {
    PatternExpansionEngine::with_hierarchy(
        HierarchyModel::empty()
            .with_prefecture("tokyo", "kanto")
            .with_prefecture("osaka", "kansai")
            .with_prefecture("kyoto", "kansai")
            .with_service("auth")
            .with_service("api")
            .with_role("primary")
            .with_role("replica"),
    )
}

fn pairs(items: &[(&str, Value)]) -> Vec<(String, Value)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// =============================================================================
// Expansion
// =============================================================================

#[test]
fn test_stream_is_idempotent() {
    let input = pairs(&[
        ("global.auth", json!(0.01)),
        ("edge.*.gateway", json!(0.03)),
        ("cluster.*.*", json!({"replicas": 2})),
    ]);
    let mut engine = scenario_engine();
    let first: Vec<(String, Value)> = engine.expand_stream(input.clone()).collect();
    let second: Vec<(String, Value)> = engine.expand_stream(input).collect();
    assert_eq!(first, second);
}

#[test]
fn test_every_item_appears_once() {
    let mut engine = scenario_engine();
    let out = engine.expand_pattern("edge.*.gateway", &json!(1));
    let mut prefectures: Vec<&str> = out
        .keys()
        .map(|k| k.split('.').nth(1).unwrap())
        .collect();
    prefectures.sort_unstable();
    assert_eq!(prefectures, vec!["kyoto", "osaka", "tokyo"]);
}

#[test]
fn test_two_wildcards_square_the_dimension() {
    let mut engine = scenario_engine();
    engine
        .add_rule("link.*.*", ExpansionRule::new(DataSource::Prefectures))
        .unwrap();
    let out = engine.expand_pattern("link.*.*", &json!(1));
    assert_eq!(out.len(), 9);
    assert!(out.contains_key("link.tokyo.tokyo"));
}

#[test]
fn test_cluster_uses_services_then_roles() {
    let mut engine = scenario_engine();
    let out = engine.expand_pattern("cluster.*.*", &json!(1));
    assert_eq!(out.len(), 4);
    assert!(out.contains_key("cluster.api.replica"));
    assert!(!out.contains_key("cluster.api.auth"));
}

#[test]
fn test_exclude_all_yields_nothing() {
    let mut engine = scenario_engine();
    engine
        .add_rule(
            "edge.*.gateway",
            ExpansionRule::new(DataSource::Prefectures).with_exclude(".*"),
        )
        .unwrap();
    assert!(engine.expand_pattern("edge.*.gateway", &json!(1)).is_empty());
}

#[test]
fn test_region_condition_and_transform() {
    let mut engine = scenario_engine();
    engine
        .add_rule(
            "edge.*.gateway",
            ExpansionRule::new(DataSource::Prefectures)
                .with_region("kansai")
                .with_transform("addLatencyFactor"),
        )
        .unwrap();
    let out = engine.expand_pattern("edge.*.gateway", &json!(0.01));
    assert_eq!(out.len(), 2);
    let osaka = out["edge.osaka.gateway"].as_f64().unwrap();
    assert!((osaka - 0.012).abs() < 1e-9);
}

#[test]
fn test_unknown_source_never_fails() {
    let mut engine = scenario_engine();
    engine
        .add_rule("dc.*.power", ExpansionRule::new("datacenters"))
        .unwrap();
    let out = engine.expand_pattern("dc.*.power", &json!(3));
    assert_eq!(out.len(), 1);
    assert_eq!(out["dc.*.power"], json!(3));
}

// =============================================================================
// Caching and Invalidation
// =============================================================================

#[test]
fn test_hierarchy_replacement_invalidates() {
    let mut engine = scenario_engine();
    assert_eq!(engine.expand_pattern("edge.*.gateway", &json!(1)).len(), 3);

    engine.set_hierarchy(HierarchyModel::empty().with_prefecture("hokkaido", "hokkaido"));
    let out = engine.expand_pattern("edge.*.gateway", &json!(1));
    assert_eq!(out.len(), 1);
    assert!(out.contains_key("edge.hokkaido.gateway"));
}

#[test]
fn test_cache_is_bounded() {
    let mut cache = BoundedCache::new(8);
    for i in 0..100 {
        cache.set(i, i * 2);
        assert!(cache.len() <= 8);
    }
    assert!(cache.stats().evictions > 0);
}

#[test]
fn test_engine_cache_stays_bounded() {
    let mut engine = scenario_engine().with_cache_size(4);
    for i in 0..50 {
        engine.expand_pattern("edge.*.gateway", &json!(i));
        assert!(engine.cache_len() <= 4);
    }
}

// =============================================================================
// Plugins
// =============================================================================

struct Uppercase;

impl ExpansionPlugin for Uppercase {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn expand(&self, pattern: &str, context: &PluginContext<'_>) -> Result<Option<Mapping>, PluginError> {
        if !pattern.starts_with("upper.") {
            return Ok(None);
        }
        let mut out = Mapping::new();
        out.insert(pattern.to_uppercase(), context.value.clone());
        Ok(Some(out))
    }
}

#[test]
fn test_plugin_replaces_expansion() {
    let mut engine = scenario_engine().with_plugin(Box::new(Uppercase));
    let out = engine.expand_pattern("upper.auth", &json!(1));
    assert_eq!(out.len(), 1);
    assert!(out.contains_key("UPPER.AUTH"));

    // other patterns fall through to the built-in tiers
    assert_eq!(engine.expand_pattern("edge.*.gateway", &json!(1)).len(), 3);
}

// =============================================================================
// Streaming
// =============================================================================

#[test]
fn test_chunked_union_equals_single_pass() {
    let mut input = pairs(&[
        ("edge.*.gateway", json!(0.03)),
        ("edge.kyoto.gateway", json!(0.09)),
        ("cluster.*.*", json!(1)),
    ]);
    for i in 0..40 {
        input.push((format!("svc{}.timeout", i), json!(i)));
    }

    let expected = scenario_engine()
        .compile_to_static_mapping(input.clone())
        .component_mapping;

    for chunk_size in [1, 3, 7, 100] {
        let mut engine = scenario_engine();
        let config = StreamingConfig {
            max_memory_mb: 64,
            chunk_size: Some(chunk_size),
            ..Default::default()
        };
        let mut compiler = StreamingCompiler::new(&mut engine, config);
        let mut merged = Mapping::new();
        for chunk in compiler.process_large_patterns(input.clone()) {
            for (key, value) in chunk {
                merged.entry(key).or_insert(value);
            }
        }
        assert_eq!(merged, expected, "chunk size {}", chunk_size);
    }
}
