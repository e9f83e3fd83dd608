//! staticmap - wildcard pattern compiler
//!
//! Expands configuration patterns such as `edge.*.gateway` against a
//! hierarchy of regions, prefectures, cities, services and roles, and renders
//! the result as a static JSON, YAML or Rust artifact. Expansion lives in the
//! `staticmap-expand` crate (re-exported as [`expand`]); this crate adds
//! loading, configuration, provenance and rendering.

pub mod compiler;
pub mod config;
pub mod loader;
pub mod provenance;
pub mod template;

pub use staticmap_expand as expand;

pub use compiler::{CompileError, CompiledArtifact, Compiler};
pub use config::{CompilationConfig, ConfigError};
pub use loader::{HierarchyFile, LoadError};
pub use provenance::{PerformanceStats, ProvenanceError, ProvenanceInfo};
pub use template::{ArtifactInputs, OutputFormat, TemplateContext, TemplateEngine, TemplateError};
