//! Artifact rendering.
//!
//! Each output format is a fixed text template with `{{name}}` placeholders.
//! Everything a template needs is materialized into a string context first;
//! rendering itself is a single textual pass, so substituted text is never
//! scanned for placeholders again.

mod json;
mod rust_module;
mod yaml;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use staticmap_expand::{HierarchyModel, StaticMapping};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::config::CompilationConfig;
use crate::provenance::ProvenanceInfo;

/// Placeholder context: name to literal replacement text.
pub type TemplateContext = HashMap<String, String>;

pub const GENERATOR_NAME: &str = "staticmap";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown output format '{0}' (expected json, yaml or rust)")]
    UnknownFormat(String),

    #[error("failed to serialize {what}: {message}")]
    Serialize { what: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Yaml,
    Rust,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Json, OutputFormat::Yaml, OutputFormat::Rust];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Rust => "rust",
        }
    }

    /// File extension for artifacts of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Rust => "rs",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            OutputFormat::Json => json::TEMPLATE,
            OutputFormat::Yaml => yaml::TEMPLATE,
            OutputFormat::Rust => rust_module::TEMPLATE,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "rust" | "rs" => Ok(OutputFormat::Rust),
            _ => Err(TemplateError::UnknownFormat(s.to_string())),
        }
    }
}

/// Everything an artifact is built from.
pub struct ArtifactInputs<'a> {
    pub mapping: &'a StaticMapping,
    pub hierarchy: &'a HierarchyModel,
    pub provenance: &'a ProvenanceInfo,
    pub config: &'a CompilationConfig,
}

impl ArtifactInputs<'_> {
    /// The `metadata` object: empty when metadata is disabled, provenance
    /// embedded only when enabled.
    pub fn metadata(&self) -> Result<Value, TemplateError> {
        if !self.config.include_metadata {
            return Ok(json!({}));
        }
        let mut metadata = json!({
            "generator": GENERATOR_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "mapping": to_value("mapping metadata", &self.mapping.metadata)?,
        });
        if self.config.include_provenance {
            metadata["provenance"] = to_value("provenance", self.provenance)?;
        }
        Ok(metadata)
    }
}

#[derive(Debug, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Materialize the placeholder context for `format`.
    pub fn build_context(
        &self,
        format: OutputFormat,
        inputs: &ArtifactInputs<'_>,
    ) -> Result<TemplateContext, TemplateError> {
        match format {
            OutputFormat::Json => json::context(inputs),
            OutputFormat::Yaml => yaml::context(inputs),
            OutputFormat::Rust => rust_module::context(inputs),
        }
    }

    /// Render the template named `format_name` against `context`.
    ///
    /// Placeholders missing from the context are left in place and logged.
    pub fn render(&self, format_name: &str, context: &TemplateContext) -> Result<String, TemplateError> {
        let format: OutputFormat = format_name.parse()?;
        Ok(substitute(format.template(), context))
    }

    /// Build the context for `format` and render it.
    pub fn render_artifact(
        &self,
        format: OutputFormat,
        inputs: &ArtifactInputs<'_>,
    ) -> Result<String, TemplateError> {
        let context = self.build_context(format, inputs)?;
        self.render(format.as_str(), &context)
    }
}

fn substitute(template: &str, context: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = after[..end].trim();
        match context.get(name) {
            Some(replacement) => out.push_str(replacement),
            None => {
                warn!(placeholder = name, "unresolved template placeholder");
                out.push_str(&rest[start..start + 2 + end + 2]);
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

pub(crate) fn to_value<T: Serialize + ?Sized>(what: &'static str, value: &T) -> Result<Value, TemplateError> {
    serde_json::to_value(value).map_err(|e| TemplateError::Serialize {
        what,
        message: e.to_string(),
    })
}

/// Pretty JSON with every line after the first indented by `indent`.
pub(crate) fn pretty_json(what: &'static str, value: &Value, indent: &str) -> Result<String, TemplateError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| TemplateError::Serialize {
        what,
        message: e.to_string(),
    })?;
    Ok(text.replace('\n', &format!("\n{}", indent)))
}
