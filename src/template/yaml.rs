//! YAML artifact. Same logical shape as the JSON artifact, block style.

use serde_json::Value;
use std::collections::BTreeMap;

use super::{to_value, ArtifactInputs, TemplateContext, TemplateError};

pub(super) const TEMPLATE: &str = "\
# Generated by {{generator}} {{version}}. Do not edit.
{{direct_mapping}}{{component_mapping}}{{metadata}}generatedAt: {{generated_at}}
fingerprint: {{fingerprint}}
";

pub(super) fn context(inputs: &ArtifactInputs<'_>) -> Result<TemplateContext, TemplateError> {
    let mut context = TemplateContext::new();
    context.insert("generator".into(), super::GENERATOR_NAME.to_string());
    context.insert("version".into(), env!("CARGO_PKG_VERSION").to_string());
    context.insert(
        "direct_mapping".into(),
        section("directMapping", to_value("direct mapping", &inputs.mapping.direct_mapping)?)?,
    );
    context.insert(
        "component_mapping".into(),
        section(
            "componentMapping",
            to_value("component mapping", &inputs.mapping.component_mapping)?,
        )?,
    );
    context.insert("metadata".into(), section("metadata", inputs.metadata()?)?);
    // JSON strings are valid double-quoted YAML scalars
    context.insert(
        "generated_at".into(),
        Value::String(inputs.provenance.generated_at()).to_string(),
    );
    context.insert(
        "fingerprint".into(),
        Value::String(inputs.provenance.execution_fingerprint.clone()).to_string(),
    );
    Ok(context)
}

/// One top-level `name: value` block.
fn section(name: &str, value: Value) -> Result<String, TemplateError> {
    let mut wrapper = BTreeMap::new();
    wrapper.insert(name, value);
    serde_yaml::to_string(&wrapper).map_err(|e| TemplateError::Serialize {
        what: "yaml section",
        message: e.to_string(),
    })
}
