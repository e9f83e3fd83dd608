//! Chunked compilation for pattern sets too large to expand in one pass.
//!
//! Patterns are ordered by priority once, then expanded a chunk at a time.
//! Each chunk is a partial mapping; the caller merges them. Because chunks
//! follow the global priority order, merging with first-wins reproduces the
//! single-pass result exactly.
//!
//! The bound on memory only holds if the caller does not itself keep every
//! chunk alive.

use serde_json::Value;
use tracing::debug;

use crate::engine::PatternExpansionEngine;
use crate::Mapping;

/// Estimated bytes of working memory per input pattern.
pub const BYTES_PER_PATTERN: usize = 1024;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Default for [`StreamingConfig::reclaim_threshold`].
pub const RECLAIM_THRESHOLD: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Memory budget in MiB.
    pub max_memory_mb: usize,
    /// Explicit upper bound on patterns per chunk.
    pub chunk_size: Option<usize>,
    /// Emitted keys after which the engine's memo cache is dropped.
    pub reclaim_threshold: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            chunk_size: None,
            reclaim_threshold: RECLAIM_THRESHOLD,
        }
    }
}

impl StreamingConfig {
    /// Patterns per chunk for `total` input patterns:
    /// `min(budget / BYTES_PER_PATTERN, max(1, total / 10))`, capped by the
    /// explicit chunk size and never below 1.
    pub fn chunk_size_for(&self, total: usize) -> usize {
        let by_memory = self.max_memory_mb.saturating_mul(BYTES_PER_MB) / BYTES_PER_PATTERN;
        let by_count = (total / 10).max(1);
        let mut size = by_memory.min(by_count);
        if let Some(explicit) = self.chunk_size {
            size = size.min(explicit);
        }
        size.max(1)
    }
}

pub struct StreamingCompiler<'e> {
    engine: &'e mut PatternExpansionEngine,
    config: StreamingConfig,
}

impl<'e> StreamingCompiler<'e> {
    pub fn new(engine: &'e mut PatternExpansionEngine, config: StreamingConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Lazily expand `patterns` one chunk at a time.
    pub fn process_large_patterns<I>(&mut self, patterns: I) -> ChunkStream<'_>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let ordered = self
            .engine
            .sort_by_priority(patterns.into_iter().collect());
        let total = ordered.len();
        let chunk_size = self.config.chunk_size_for(total);
        debug!(total, chunk_size, "streaming compile started");

        ChunkStream {
            engine: &mut *self.engine,
            pending: ordered.into_iter(),
            chunk_size,
            reclaim_threshold: self.config.reclaim_threshold,
            total,
            processed: 0,
            working_set: 0,
            reclaim_hints: 0,
        }
    }
}

/// Lazy sequence of partial mappings from [`StreamingCompiler::process_large_patterns`].
pub struct ChunkStream<'e> {
    engine: &'e mut PatternExpansionEngine,
    pending: std::vec::IntoIter<(String, Value)>,
    chunk_size: usize,
    reclaim_threshold: usize,
    total: usize,
    processed: usize,
    working_set: usize,
    reclaim_hints: usize,
}

impl ChunkStream<'_> {
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total input patterns.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Input patterns expanded so far.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Number of times the memo cache was dropped to reclaim memory.
    pub fn reclaim_hints(&self) -> usize {
        self.reclaim_hints
    }
}

impl Iterator for ChunkStream<'_> {
    type Item = Mapping;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<(String, Value)> = self.pending.by_ref().take(self.chunk_size).collect();
        if batch.is_empty() {
            return None;
        }
        self.processed += batch.len();

        let mut chunk = Mapping::new();
        for (key, value) in self.engine.expand_stream(batch) {
            chunk.entry(key).or_insert(value);
        }

        self.working_set += chunk.len();
        if self.working_set >= self.reclaim_threshold {
            self.engine.clear_cache();
            self.reclaim_hints += 1;
            debug!(
                working_set = self.working_set,
                processed = self.processed,
                "reclaiming expansion cache"
            );
            self.working_set = 0;
        }

        Some(chunk)
    }
}
