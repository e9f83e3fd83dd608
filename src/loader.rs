//! Input loading: pattern documents and hierarchy files.

use serde::Deserialize;
use serde_json::Value;
use staticmap_expand::{DataSource, ExpansionRule, HierarchyModel, UNASSIGNED_REGION};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Top-level keys checked, in order, for the pattern table.
pub const PATTERN_SECTIONS: [&str; 4] = ["service_times", "patterns", "services", "traffic"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("'{path}' does not contain a mapping of patterns")]
    NotAMapping { path: PathBuf },

    #[error("invalid hierarchy in '{path}': {message}")]
    InvalidHierarchy { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// Format implied by the file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "toml" => Some(DocumentFormat::Toml),
            _ => None,
        }
    }
}

/// Read and parse a structured document.
///
/// The extension picks the parser; without a known extension JSON is tried
/// first, then YAML.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &contents, DocumentFormat::from_path(path))
}

fn parse_document(
    path: &Path,
    contents: &str,
    format: Option<DocumentFormat>,
) -> Result<Value, LoadError> {
    let parse_error = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match format {
        Some(DocumentFormat::Json) => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string())),
        Some(DocumentFormat::Yaml) => serde_yaml::from_str(contents).map_err(|e| parse_error(e.to_string())),
        Some(DocumentFormat::Toml) => toml::from_str::<toml::Value>(contents)
            .map(toml_to_json)
            .map_err(|e| parse_error(e.to_string())),
        None => match serde_json::from_str(contents) {
            Ok(value) => Ok(value),
            Err(json_err) => serde_yaml::from_str(contents).map_err(|yaml_err| {
                parse_error(format!("not JSON ({}) or YAML ({})", json_err, yaml_err))
            }),
        },
    }
}

/// Load a pattern document and extract its `(pattern, value)` pairs.
pub fn load_patterns(path: &Path) -> Result<Vec<(String, Value)>, LoadError> {
    let document = load_document(path)?;
    extract_patterns(document, path)
}

/// The first of [`PATTERN_SECTIONS`] that holds a mapping, else the whole
/// document.
pub fn extract_patterns(document: Value, path: &Path) -> Result<Vec<(String, Value)>, LoadError> {
    let Value::Object(mut root) = document else {
        return Err(LoadError::NotAMapping {
            path: path.to_path_buf(),
        });
    };

    for section in PATTERN_SECTIONS {
        if matches!(root.get(section), Some(Value::Object(_))) {
            if let Some(Value::Object(patterns)) = root.remove(section) {
                debug!(section, count = patterns.len(), "using pattern section");
                return Ok(patterns.into_iter().collect());
            }
        }
    }
    Ok(root.into_iter().collect())
}

/// Convert a TOML value to JSON. Non-finite floats become null.
pub fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}

/// A parsed hierarchy file.
#[derive(Debug, Clone)]
pub struct HierarchyFile {
    pub model: HierarchyModel,
    /// Rules from `pattern_rules`, in file order; malformed entries are skipped.
    pub rules: Vec<(String, ExpansionRule)>,
    /// Extra dimensions from `dimensions`.
    pub dimensions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct HierarchyDocument {
    #[serde(default)]
    regions: Vec<String>,
    #[serde(default)]
    prefectures: Option<PrefectureSpec>,
    /// city → prefecture
    #[serde(default)]
    cities: BTreeMap<String, String>,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    dimensions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pattern_rules: serde_json::Map<String, Value>,
}

/// Prefectures as `{name: region}` or as a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PrefectureSpec {
    Map(BTreeMap<String, String>),
    List(Vec<PrefectureEntry>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PrefectureEntry {
    Name(String),
    Detailed { name: String, region: Option<String> },
}

impl PrefectureSpec {
    fn into_pairs(self) -> Vec<(String, String)> {
        match self {
            PrefectureSpec::Map(map) => map.into_iter().collect(),
            PrefectureSpec::List(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    PrefectureEntry::Name(name) => (name, UNASSIGNED_REGION.to_string()),
                    PrefectureEntry::Detailed { name, region } => {
                        (name, region.unwrap_or_else(|| UNASSIGNED_REGION.to_string()))
                    }
                })
                .collect(),
        }
    }
}

/// Parse a hierarchy file (JSON, YAML or TOML by extension).
pub fn load_hierarchy(path: &Path) -> Result<HierarchyFile, LoadError> {
    let document = load_document(path)?;
    if !document.is_object() {
        return Err(LoadError::NotAMapping {
            path: path.to_path_buf(),
        });
    }
    let document: HierarchyDocument =
        serde_json::from_value(document).map_err(|e| LoadError::InvalidHierarchy {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut model = HierarchyModel::empty();
    for region in document.regions {
        model = model.with_region(region);
    }
    for (name, region) in document.prefectures.map(PrefectureSpec::into_pairs).unwrap_or_default() {
        model = model.with_prefecture(name, region);
    }
    for (city, prefecture) in document.cities {
        model = model.with_city(city, prefecture);
    }
    for service in document.services {
        model = model.with_service(service);
    }
    for role in document.roles {
        model = model.with_role(role);
    }

    let rules = document
        .pattern_rules
        .into_iter()
        .filter_map(|(pattern, entry)| match parse_rule(entry) {
            Ok(rule) => Some((pattern, rule)),
            Err(err) => {
                warn!(path = %path.display(), pattern = %pattern, error = %err, "skipping invalid pattern rule");
                None
            }
        })
        .collect();

    Ok(HierarchyFile {
        model,
        rules,
        dimensions: document.dimensions,
    })
}

/// A rule is either a full object or a bare data-source name.
fn parse_rule(entry: Value) -> Result<ExpansionRule, serde_json::Error> {
    match entry {
        Value::String(source) => Ok(ExpansionRule::new(DataSource::from(source))),
        other => serde_json::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.toml")), Some(DocumentFormat::Toml));
        assert_eq!(DocumentFormat::from_path(Path::new("patterns")), None);
    }

    #[test]
    fn test_not_found() {
        let err = load_document(Path::new("/nonexistent/patterns.json")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
        assert!(err.to_string().contains("/nonexistent/patterns.json"));
    }

    #[test]
    fn test_parse_error_names_path() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.json", "{not json");
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_unknown_extension_falls_back_to_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "patterns.conf", "global.auth: 0.01\n");
        let value = load_document(&path).unwrap();
        assert_eq!(value, json!({"global.auth": 0.01}));
    }

    #[test]
    fn test_extract_checks_sections_in_order() {
        let path = Path::new("p.json");
        let doc = json!({
            "services": {"b": 2},
            "service_times": {"a": 1},
        });
        let patterns = extract_patterns(doc, path).unwrap();
        assert_eq!(patterns, vec![("a".to_string(), json!(1))]);

        // A non-mapping section is skipped
        let doc = json!({"patterns": [1, 2], "traffic": {"t": 3}});
        let patterns = extract_patterns(doc, path).unwrap();
        assert_eq!(patterns, vec![("t".to_string(), json!(3))]);
    }

    #[test]
    fn test_patterns_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let expected = vec!["zeta.*.gateway", "alpha.auth", "mid.cache"];
        let files = [
            ("order.json", r#"{"patterns": {"zeta.*.gateway": 1, "alpha.auth": 2, "mid.cache": 3}}"#),
            ("order.yaml", "patterns:\n  zeta.*.gateway: 1\n  alpha.auth: 2\n  mid.cache: 3\n"),
            ("order.toml", "[patterns]\n\"zeta.*.gateway\" = 1\n\"alpha.auth\" = 2\n\"mid.cache\" = 3\n"),
        ];
        for (name, contents) in files {
            let path = write(&dir, name, contents);
            let patterns = load_patterns(&path).unwrap();
            let keys: Vec<&str> = patterns.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, expected, "{}", name);
        }
    }

    #[test]
    fn test_extract_whole_document() {
        let doc = json!({"global.auth": 0.01, "edge.*.gateway": 0.03});
        let patterns = extract_patterns(doc, Path::new("p.json")).unwrap();
        assert_eq!(patterns.len(), 2);
    }

    #[test]
    fn test_extract_rejects_non_mapping() {
        let err = extract_patterns(json!([1, 2, 3]), Path::new("p.json")).unwrap_err();
        assert!(matches!(err, LoadError::NotAMapping { .. }));
    }

    #[test]
    fn test_toml_patterns() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "patterns.toml",
            "[service_times]\n\"global.auth\" = 0.01\n\"edge.*.gateway\" = 0.03\n",
        );
        let patterns = load_patterns(&path).unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.contains(&("edge.*.gateway".to_string(), json!(0.03))));
    }

    #[test]
    fn test_hierarchy_map_form() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "hierarchy.json",
            r#"{
                "prefectures": {"tokyo": "kanto", "osaka": "kansai"},
                "cities": {"shibuya": "tokyo"},
                "services": ["auth", "api"],
                "dimensions": {"tiers": ["gold", "silver"]},
                "pattern_rules": {
                    "tier.*.quota": "tiers",
                    "edge.*.gateway": {"data_source": "prefectures", "conditions": {"region": "kanto"}}
                }
            }"#,
        );
        let file = load_hierarchy(&path).unwrap();
        // map-form prefectures are visited in name order
        assert_eq!(file.model.regions(), &["kansai".to_string(), "kanto".to_string()]);
        assert_eq!(file.model.region_of("shibuya"), Some("kanto"));
        assert_eq!(file.model.services().len(), 2);
        assert_eq!(file.dimensions["tiers"].len(), 2);
        assert_eq!(file.rules.len(), 2);

        let (_, tier_rule) = file.rules.iter().find(|(p, _)| p == "tier.*.quota").unwrap();
        assert_eq!(tier_rule.data_source, DataSource::Named("tiers".to_string()));
    }

    #[test]
    fn test_hierarchy_list_form() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "hierarchy.yaml",
            "prefectures:\n  - tokyo\n  - name: osaka\n    region: kansai\n",
        );
        let file = load_hierarchy(&path).unwrap();
        assert_eq!(file.model.region_of("tokyo"), Some(UNASSIGNED_REGION));
        assert_eq!(file.model.region_of("osaka"), Some("kansai"));
    }

    #[test]
    fn test_hierarchy_skips_malformed_rule() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "hierarchy.json",
            r#"{"pattern_rules": {"a.*": {"priority": 5}, "b.*": "services"}}"#,
        );
        let file = load_hierarchy(&path).unwrap();
        assert_eq!(file.rules.len(), 1);
        assert_eq!(file.rules[0].0, "b.*");
    }

    #[test]
    fn test_hierarchy_wrong_shape() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "hierarchy.json", r#"{"services": "auth"}"#);
        let err = load_hierarchy(&path).unwrap_err();
        assert!(matches!(err, LoadError::InvalidHierarchy { .. }));
    }
}
