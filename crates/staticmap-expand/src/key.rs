//! Structural cache keys.
//!
//! A key pairs the pattern text with the JCS (RFC 8785) serialization of the
//! value, so two values collide only if they are structurally equal. The
//! derived `Hash` only narrows the bucket; equality compares the full bytes.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpansionKey {
    pattern: String,
    value: Vec<u8>,
}

impl ExpansionKey {
    pub fn new(pattern: &str, value: &Value) -> Self {
        // JCS only rejects non-finite floats, which a serde_json Value cannot hold
        let value = serde_json_canonicalizer::to_vec(value)
            .unwrap_or_else(|_| value.to_string().into_bytes());
        Self {
            pattern: pattern.to_string(),
            value,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
