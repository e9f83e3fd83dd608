//! Compilation orchestration.
//!
//! Load → (hierarchy) → expand → provenance → render → write. Every fatal
//! condition surfaces as a [`CompileError`] before the output file is
//! touched, so a failed compile never leaves a partial artifact behind.

use chrono::{DateTime, Utc};
use serde_json::Value;
use staticmap_expand::{
    MappingMetadata, PatternExpansionEngine, StaticMapping, StreamingCompiler,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CompilationConfig, ConfigError};
use crate::loader::{self, LoadError};
use crate::provenance::{PerformanceStats, ProvenanceError, ProvenanceInfo};
use crate::template::{ArtifactInputs, OutputFormat, TemplateEngine, TemplateError};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("provenance error: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
}

impl CompileError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Config(_) | CompileError::Template(_) => 2,
            CompileError::Load(_) => 3,
            CompileError::Write { .. } => 4,
            CompileError::Provenance(_) | CompileError::Serialization(_) => 1,
        }
    }
}

/// Result of one compilation.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub format: OutputFormat,
    /// Rendered artifact text
    pub content: String,
    pub mapping: StaticMapping,
    pub provenance: ProvenanceInfo,
    /// Where the artifact was written, if anywhere
    pub output_path: Option<PathBuf>,
}

pub struct Compiler {
    engine: PatternExpansionEngine,
    config: CompilationConfig,
    templates: TemplateEngine,
}

impl Compiler {
    /// Compiler over the built-in taxonomy.
    pub fn new(config: CompilationConfig) -> Self {
        let engine = PatternExpansionEngine::new().with_cache_size(config.cache_size);
        Self::with_engine(engine, config)
    }

    pub fn with_engine(engine: PatternExpansionEngine, config: CompilationConfig) -> Self {
        Self {
            engine,
            config,
            templates: TemplateEngine::new(),
        }
    }

    pub fn engine(&self) -> &PatternExpansionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PatternExpansionEngine {
        &mut self.engine
    }

    pub fn config(&self) -> &CompilationConfig {
        &self.config
    }

    /// Install the hierarchy, dimensions and rules from a hierarchy file.
    ///
    /// Returns `Ok(false)` when the file does not exist; that is tolerated.
    /// Rules that fail validation are skipped with a warning.
    pub fn apply_hierarchy_file(&mut self, path: &Path) -> Result<bool, CompileError> {
        if !path.exists() {
            warn!(path = %path.display(), "hierarchy file not found; keeping current hierarchy");
            return Ok(false);
        }

        let file = loader::load_hierarchy(path)?;
        self.engine.set_hierarchy(file.model);
        for (name, items) in file.dimensions {
            self.engine.register_dimension(name, items);
        }

        let mut applied = 0;
        for (pattern, rule) in file.rules {
            match self.engine.add_rule(pattern.clone(), rule) {
                Ok(()) => applied += 1,
                Err(err) => warn!(pattern = %pattern, error = %err, "skipping pattern rule"),
            }
        }
        info!(
            path = %path.display(),
            rules = applied,
            version = self.engine.hierarchy_version(),
            "hierarchy loaded"
        );
        Ok(true)
    }

    /// Compile `input` in a single pass.
    pub fn compile_config(
        &mut self,
        input: &Path,
        hierarchy: Option<&Path>,
        output: Option<&Path>,
    ) -> Result<CompiledArtifact, CompileError> {
        let started = Instant::now();
        let timestamp = Utc::now();

        let patterns = loader::load_patterns(input)?;
        let inputs = self.resolve_inputs(input, hierarchy)?;

        info!(input = %input.display(), patterns = patterns.len(), "compiling");
        let mapping = self.engine.compile_to_static_mapping(patterns);
        self.finish(mapping, &inputs, timestamp, started, 0, output)
    }

    /// Compile `input` chunk by chunk, calling `progress(done, total)` after
    /// each chunk. The artifact is written once, at the end.
    pub fn compile_large_config(
        &mut self,
        input: &Path,
        hierarchy: Option<&Path>,
        output: Option<&Path>,
        mut progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<CompiledArtifact, CompileError> {
        let started = Instant::now();
        let timestamp = Utc::now();

        let patterns = loader::load_patterns(input)?;
        let inputs = self.resolve_inputs(input, hierarchy)?;
        let pattern_count = patterns.len();
        let wildcard_pattern_count = patterns
            .iter()
            .filter(|(pattern, _)| staticmap_expand::pattern::has_wildcard(pattern))
            .count();

        let mut mapping = StaticMapping::default();
        let mut chunks = 0;
        {
            let mut streaming = StreamingCompiler::new(&mut self.engine, self.config.streaming());
            let mut stream = streaming.process_large_patterns(patterns);
            info!(
                input = %input.display(),
                patterns = stream.total(),
                chunk_size = stream.chunk_size(),
                "compiling in chunks"
            );
            while let Some(chunk) = stream.next() {
                mapping.merge_chunk(chunk);
                chunks += 1;
                debug!(done = stream.processed(), total = stream.total(), "chunk merged");
                if let Some(report) = progress.as_deref_mut() {
                    report(stream.processed(), stream.total());
                }
            }
        }

        mapping.metadata = MappingMetadata {
            pattern_count,
            wildcard_pattern_count,
            expanded_key_count: mapping.component_mapping.len(),
            rule_count: self.engine.rule_count(),
            hierarchy_version: self.engine.hierarchy_version(),
        };
        self.finish(mapping, &inputs, timestamp, started, chunks, output)
    }

    /// Apply the optional hierarchy file and list the files the artifact
    /// was built from.
    fn resolve_inputs<'p>(
        &mut self,
        input: &'p Path,
        hierarchy: Option<&'p Path>,
    ) -> Result<Vec<&'p Path>, CompileError> {
        let mut inputs = vec![input];
        if let Some(hierarchy) = hierarchy {
            if self.apply_hierarchy_file(hierarchy)? {
                inputs.push(hierarchy);
            }
        }
        Ok(inputs)
    }

    fn finish(
        &self,
        mapping: StaticMapping,
        inputs: &[&Path],
        timestamp: DateTime<Utc>,
        started: Instant,
        chunks: usize,
        output: Option<&Path>,
    ) -> Result<CompiledArtifact, CompileError> {
        let stats = self.engine.cache_stats();
        let performance = PerformanceStats {
            elapsed_ms: started.elapsed().as_millis() as u64,
            patterns_in: mapping.metadata.pattern_count,
            keys_out: mapping.component_mapping.len(),
            chunks,
            cache_hits: stats.hits,
            cache_misses: stats.misses,
            cache_evictions: stats.evictions,
        };
        let config: Value = serde_json::to_value(&self.config)?;
        let provenance = ProvenanceInfo::capture(inputs, config, timestamp, performance)?;

        let format = self.config.output_format;
        let content = self.templates.render_artifact(
            format,
            &ArtifactInputs {
                mapping: &mapping,
                hierarchy: self.engine.hierarchy(),
                provenance: &provenance,
                config: &self.config,
            },
        )?;

        if let Some(path) = output {
            write_artifact(path, &content)?;
            info!(
                output = %path.display(),
                format = %format,
                keys = mapping.component_mapping.len(),
                "artifact written"
            );
        }

        Ok(CompiledArtifact {
            format,
            content,
            mapping,
            provenance,
            output_path: output.map(Path::to_path_buf),
        })
    }
}

fn write_artifact(path: &Path, content: &str) -> Result<(), CompileError> {
    let write_error = |source| CompileError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, content).map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_exit_codes() {
        let load = CompileError::Load(LoadError::NotFound(PathBuf::from("x.json")));
        assert_eq!(load.exit_code(), 3);
        let template = CompileError::Template(TemplateError::UnknownFormat("xml".into()));
        assert_eq!(template.exit_code(), 2);
        let write = CompileError::Write {
            path: PathBuf::from("out"),
            source: io::Error::new(io::ErrorKind::Other, "denied"),
        };
        assert_eq!(write.exit_code(), 4);
    }

    #[test]
    fn test_missing_hierarchy_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let mut compiler = Compiler::new(CompilationConfig::default());
        let applied = compiler
            .apply_hierarchy_file(&dir.path().join("missing.json"))
            .unwrap();
        assert!(!applied);
        assert_eq!(compiler.engine().hierarchy_version(), 1);
    }

    #[test]
    fn test_hierarchy_rules_and_dimensions() {
        let dir = TempDir::new().unwrap();
        let hierarchy = write_json(
            &dir,
            "hierarchy.json",
            &json!({
                "prefectures": {"tokyo": "kanto"},
                "dimensions": {"tiers": ["gold", "silver"]},
                "pattern_rules": {
                    "tier.*.quota": "tiers",
                    "bad.*": {"data_source": "tiers", "conditions": {"include": "("}}
                }
            }),
        );
        let mut compiler = Compiler::new(CompilationConfig::default());
        assert!(compiler.apply_hierarchy_file(&hierarchy).unwrap());
        assert_eq!(compiler.engine().hierarchy_version(), 2);
        assert!(compiler.engine().rule("tier.*.quota").is_some());
        assert!(compiler.engine().rule("bad.*").is_none());

        let out = compiler.engine_mut().expand_pattern("tier.*.quota", &json!(10));
        assert_eq!(out.len(), 2);
        assert!(out.contains_key("tier.gold.quota"));
    }

    #[test]
    fn test_output_parent_dirs_created() {
        let dir = TempDir::new().unwrap();
        let input = write_json(&dir, "patterns.json", &json!({"global.auth": 0.01}));
        let output = dir.path().join("nested/deeper/map.json");

        let mut compiler = Compiler::new(CompilationConfig::default());
        let artifact = compiler.compile_config(&input, None, Some(&output)).unwrap();

        assert_eq!(artifact.output_path.as_deref(), Some(output.as_path()));
        assert_eq!(fs::read_to_string(&output).unwrap(), artifact.content);
    }

    #[test]
    fn test_load_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("map.json");
        let mut compiler = Compiler::new(CompilationConfig::default());
        let err = compiler
            .compile_config(&dir.path().join("absent.json"), None, Some(&output))
            .unwrap_err();
        assert!(matches!(err, CompileError::Load(LoadError::NotFound(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_provenance_records_inputs() {
        let dir = TempDir::new().unwrap();
        let input = write_json(&dir, "patterns.json", &json!({"edge.*.gateway": 0.03}));
        let hierarchy = write_json(&dir, "hierarchy.json", &json!({"prefectures": {"tokyo": "kanto"}}));

        let mut compiler = Compiler::new(CompilationConfig::default());
        let artifact = compiler.compile_config(&input, Some(&hierarchy), None).unwrap();

        assert_eq!(artifact.provenance.input_files.len(), 2);
        assert_eq!(artifact.provenance.performance.patterns_in, 1);
        assert_eq!(artifact.provenance.performance.keys_out, 1);
        assert_eq!(artifact.provenance.config["output_format"], "json");
        assert!(artifact.output_path.is_none());
    }
}
