//! JSON artifact.

use serde_json::Value;

use super::{pretty_json, to_value, ArtifactInputs, TemplateContext, TemplateError};

pub(super) const TEMPLATE: &str = r#"{
  "directMapping": {{direct_mapping}},
  "componentMapping": {{component_mapping}},
  "metadata": {{metadata}},
  "generatedAt": {{generated_at}},
  "fingerprint": {{fingerprint}}
}
"#;

const INDENT: &str = "  ";

pub(super) fn context(inputs: &ArtifactInputs<'_>) -> Result<TemplateContext, TemplateError> {
    let direct = to_value("direct mapping", &inputs.mapping.direct_mapping)?;
    let component = to_value("component mapping", &inputs.mapping.component_mapping)?;

    let mut context = TemplateContext::new();
    context.insert("direct_mapping".into(), pretty_json("direct mapping", &direct, INDENT)?);
    context.insert(
        "component_mapping".into(),
        pretty_json("component mapping", &component, INDENT)?,
    );
    context.insert(
        "metadata".into(),
        pretty_json("metadata", &inputs.metadata()?, INDENT)?,
    );
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

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::super::*;
    use serde_json::json;

    #[test]
    fn test_json_artifact_parses_back() {
        let (mapping, hierarchy, provenance) = fixture();
        let config = CompilationConfig::default();
        let inputs = ArtifactInputs {
            mapping: &mapping,
            hierarchy: &hierarchy,
            provenance: &provenance,
            config: &config,
        };
        let text = TemplateEngine::new()
            .render_artifact(OutputFormat::Json, &inputs)
            .unwrap();

        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["directMapping"], json!({}));
        assert_eq!(doc["componentMapping"]["global.auth"], json!(0.01));
        assert_eq!(doc["componentMapping"]["edge.osaka.gateway"], json!(0.03));
        assert_eq!(doc["componentMapping"]["global.label"], json!("primary"));
        assert_eq!(doc["generatedAt"], "2026-03-01T12:00:00.000Z");
        assert_eq!(doc["fingerprint"], json!(provenance.execution_fingerprint));
        assert_eq!(
            doc["metadata"]["provenance"]["execution_fingerprint"],
            json!(provenance.execution_fingerprint)
        );
    }
}
