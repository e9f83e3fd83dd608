//! Self-contained Rust module artifact.
//!
//! The generated module has no dependencies. Entries are emitted in key
//! order, which is what the binary-search lookup relies on.

use serde_json::Value;
use std::fmt::Write as _;

use super::{ArtifactInputs, TemplateContext, TemplateError};

pub(super) const TEMPLATE: &str = r#"//! Static service mapping generated by {{generator}} {{version}}.
//!
//! Generated at {{generated_at_text}}.
//! Fingerprint: {{fingerprint_text}}
//!
//! Do not edit by hand.

#![allow(dead_code)]

/// `(key, value as JSON, numeric value)`, sorted by key.
pub static ENTRIES: [(&str, &str, Option<f64>); {{entry_count}}] = [
{{entries}}];

/// Literal overrides, same layout as `ENTRIES`.
pub static DIRECT_ENTRIES: [(&str, &str, Option<f64>); {{direct_count}}] = [
{{direct_entries}}];

/// Region to prefectures.
pub static REGION_PREFECTURES: [(&str, &[&str]); {{region_count}}] = [
{{region_prefectures}}];

/// Artifact metadata as JSON.
pub const METADATA: &str = {{metadata}};

pub const GENERATED_AT: &str = {{generated_at}};

pub const FINGERPRINT: &str = {{fingerprint}};

fn find(key: &str) -> Option<&'static (&'static str, &'static str, Option<f64>)> {
    if let Some(entry) = DIRECT_ENTRIES.iter().find(|entry| entry.0 == key) {
        return Some(entry);
    }
{{lookup}}
}

/// Numeric value for `key`.
pub fn get_service_time(key: &str) -> Option<f64> {
    find(key).and_then(|entry| entry.2)
}

/// Value for `key` as JSON text.
pub fn get_service_info(key: &str) -> Option<&'static str> {
    find(key).map(|entry| entry.1)
}

pub fn list_all_services() -> Vec<&'static str> {
    ENTRIES.iter().map(|entry| entry.0).collect()
}

/// Keys matching a dotted pattern where `*` matches exactly one segment.
pub fn get_services_by_pattern(pattern: &str) -> Vec<&'static str> {
    let wanted: Vec<&str> = pattern.split('.').collect();
    ENTRIES
        .iter()
        .map(|entry| entry.0)
        .filter(|key| {
            let segments: Vec<&str> = key.split('.').collect();
            segments.len() == wanted.len()
                && segments
                    .iter()
                    .zip(&wanted)
                    .all(|(segment, want)| *want == "*" || segment == want)
        })
        .collect()
}

pub fn get_region_prefectures(region: &str) -> &'static [&'static str] {
    REGION_PREFECTURES
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, prefectures)| *prefectures)
        .unwrap_or(&[])
}

pub fn get_prefecture_region(prefecture: &str) -> Option<&'static str> {
    REGION_PREFECTURES
        .iter()
        .find(|(_, prefectures)| prefectures.iter().any(|p| *p == prefecture))
        .map(|(region, _)| *region)
}
"#;

const BINARY_SEARCH: &str = "    ENTRIES
        .binary_search_by(|entry| entry.0.cmp(key))
        .ok()
        .map(|index| &ENTRIES[index])";

const LINEAR_SCAN: &str = "    ENTRIES.iter().find(|entry| entry.0 == key)";

pub(super) fn context(inputs: &ArtifactInputs<'_>) -> Result<TemplateContext, TemplateError> {
    let mapping = inputs.mapping;
    let metadata = serde_json::to_string(&inputs.metadata()?).map_err(|e| TemplateError::Serialize {
        what: "metadata",
        message: e.to_string(),
    })?;
    let groups = inputs.hierarchy.prefectures_by_region();
    let generated_at = inputs.provenance.generated_at();
    let fingerprint = &inputs.provenance.execution_fingerprint;

    let mut context = TemplateContext::new();
    context.insert("generator".into(), super::GENERATOR_NAME.to_string());
    context.insert("version".into(), env!("CARGO_PKG_VERSION").to_string());
    context.insert("generated_at_text".into(), generated_at.clone());
    context.insert("fingerprint_text".into(), fingerprint.clone());
    context.insert("generated_at".into(), format!("{:?}", generated_at));
    context.insert("fingerprint".into(), format!("{:?}", fingerprint));
    context.insert("metadata".into(), format!("{:?}", metadata));
    context.insert("entry_count".into(), mapping.component_mapping.len().to_string());
    context.insert("entries".into(), entry_rows(mapping.component_mapping.iter()));
    context.insert("direct_count".into(), mapping.direct_mapping.len().to_string());
    context.insert("direct_entries".into(), entry_rows(mapping.direct_mapping.iter()));
    context.insert("region_count".into(), groups.len().to_string());
    context.insert("region_prefectures".into(), region_rows(&groups));
    let lookup = if inputs.config.optimize_lookups {
        BINARY_SEARCH
    } else {
        LINEAR_SCAN
    };
    context.insert("lookup".into(), lookup.to_string());
    Ok(context)
}

fn entry_rows<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> String {
    let mut rows = String::new();
    for (key, value) in entries {
        let numeric = match value.as_f64() {
            Some(number) => format!("Some({:?})", number),
            None => "None".to_string(),
        };
        let _ = writeln!(rows, "    ({:?}, {:?}, {}),", key, value.to_string(), numeric);
    }
    rows
}

fn region_rows(groups: &[(String, Vec<String>)]) -> String {
    let mut rows = String::new();
    for (region, prefectures) in groups {
        let names: Vec<String> = prefectures.iter().map(|name| format!("{:?}", name)).collect();
        let _ = writeln!(rows, "    ({:?}, &[{}]),", region, names.join(", "));
    }
    rows
}
