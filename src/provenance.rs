//! Provenance attached to compiled artifacts.
//!
//! The execution fingerprint is the SHA-256 of the JCS (RFC 8785) form of
//! `{config, input_files, timestamp}`, so two runs with the same inputs and
//! settings at the same instant produce the same fingerprint.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

/// Schema version for provenance blocks
pub const PROVENANCE_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for provenance blocks
pub const PROVENANCE_SCHEMA_ID: &str = "staticmap/provenance@1";

#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("JCS serialization failed: {0}")]
    Jcs(String),
}

/// Counters gathered while compiling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub elapsed_ms: u64,
    pub patterns_in: usize,
    pub keys_out: usize,
    /// Streaming chunks; 0 for a single-pass compile
    pub chunks: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceInfo {
    pub schema_version: u32,
    pub schema_id: String,
    pub timestamp: DateTime<Utc>,
    /// Compiler version
    pub version: String,
    pub input_files: Vec<String>,
    /// Settings snapshot the artifact was compiled with
    pub config: Value,
    pub execution_fingerprint: String,
    pub performance: PerformanceStats,
}

impl ProvenanceInfo {
    /// Capture provenance for a compile that started at `timestamp`.
    pub fn capture(
        input_files: &[&Path],
        config: Value,
        timestamp: DateTime<Utc>,
        performance: PerformanceStats,
    ) -> Result<Self, ProvenanceError> {
        let input_files: Vec<String> = input_files
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        let execution_fingerprint = compute_fingerprint(&input_files, &config, &timestamp)?;

        Ok(Self {
            schema_version: PROVENANCE_SCHEMA_VERSION,
            schema_id: PROVENANCE_SCHEMA_ID.to_string(),
            timestamp,
            version: env!("CARGO_PKG_VERSION").to_string(),
            input_files,
            config,
            execution_fingerprint,
            performance,
        })
    }

    /// Timestamp in the RFC 3339 form used by artifacts.
    pub fn generated_at(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// SHA-256 hex of the canonical `{config, input_files, timestamp}` object.
pub fn compute_fingerprint(
    input_files: &[String],
    config: &Value,
    timestamp: &DateTime<Utc>,
) -> Result<String, ProvenanceError> {
    let subject = json!({
        "config": config,
        "input_files": input_files,
        "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    let jcs_bytes =
        serde_json_canonicalizer::to_vec(&subject).map_err(|e| ProvenanceError::Jcs(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&jcs_bytes);
    Ok(hex::encode(hasher.finalize()))
}
