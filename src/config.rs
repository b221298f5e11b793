//! Ingestion settings.
//!
//! Every field has a default, so a settings file only needs the keys it changes:
//!
//! ```json
//! { "streaming_threshold_bytes": 52428800, "max_reads_per_reference": 50000 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Text alignment files larger than this are streamed (100 MiB)
pub const DEFAULT_STREAMING_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

/// Largest file the local file service will return as a single string (512 MiB)
pub const DEFAULT_MAX_WHOLE_READ_BYTES: u64 = 512 * 1024 * 1024;

/// Per-reference read cap for in-memory alignment decoding
pub const DEFAULT_MAX_READS_PER_REFERENCE: usize = 100_000;

/// Whole-file decodes above this many lines yield to the runtime periodically
pub const DEFAULT_LARGE_FILE_LINE_THRESHOLD: usize = 100_000;

/// Lines per streamed chunk event
pub const DEFAULT_CHUNK_LINES: usize = 10_000;

/// Cap on a single (non-translation) qualifier value (32 KiB)
pub const DEFAULT_MAX_QUALIFIER_BYTES: usize = 32 * 1024;

/// Prefix kept from a `translation` qualifier
pub const DEFAULT_TRANSLATION_PREVIEW_CHARS: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Configuration for the ingestion engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Text alignment files above this size use the streamed strategy
    pub streaming_threshold_bytes: u64,

    /// Whole-file reads above this size fail with `RequiresStreaming`
    pub max_whole_read_bytes: u64,

    /// Reads kept per reference when alignments are decoded into memory
    pub max_reads_per_reference: usize,

    /// Line count above which whole-file decoding yields every ~1% of lines
    pub large_file_line_threshold: usize,

    /// Lines carried by each streamed chunk
    pub chunk_lines: usize,

    /// Minimum integer-percent advance between two progress events
    pub progress_step_percent: u8,

    /// Byte cap on a single qualifier value before a truncation marker is appended
    pub max_qualifier_bytes: usize,

    /// Characters kept from `translation` qualifiers
    pub translation_preview_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            streaming_threshold_bytes: DEFAULT_STREAMING_THRESHOLD_BYTES,
            max_whole_read_bytes: DEFAULT_MAX_WHOLE_READ_BYTES,
            max_reads_per_reference: DEFAULT_MAX_READS_PER_REFERENCE,
            large_file_line_threshold: DEFAULT_LARGE_FILE_LINE_THRESHOLD,
            chunk_lines: DEFAULT_CHUNK_LINES,
            progress_step_percent: 1,
            max_qualifier_bytes: DEFAULT_MAX_QUALIFIER_BYTES,
            translation_preview_chars: DEFAULT_TRANSLATION_PREVIEW_CHARS,
        }
    }
}

impl IngestConfig {
    /// Load a config from a JSON file, filling unspecified fields with defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::ParseError` for invalid JSON, or
    /// `ConfigError::InvalidValue` if a value is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a config from JSON text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` for invalid JSON, or
    /// `ConfigError::InvalidValue` if a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_lines == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunk_lines",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.progress_step_percent == 0 || self.progress_step_percent > 100 {
            return Err(ConfigError::InvalidValue {
                field: "progress_step_percent",
                reason: format!("{} is outside 1..=100", self.progress_step_percent),
            });
        }
        if self.max_reads_per_reference == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_reads_per_reference",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = IngestConfig::from_json(r#"{"streaming_threshold_bytes": 1024}"#).unwrap();
        assert_eq!(config.streaming_threshold_bytes, 1024);
        assert_eq!(config.max_reads_per_reference, DEFAULT_MAX_READS_PER_REFERENCE);
        assert_eq!(config.chunk_lines, DEFAULT_CHUNK_LINES);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            IngestConfig::from_json(r#"{"chunk_lines": 0}"#),
            Err(ConfigError::InvalidValue { field: "chunk_lines", .. })
        ));
        assert!(matches!(
            IngestConfig::from_json(r#"{"progress_step_percent": 101}"#),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            IngestConfig::from_json("not json"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
