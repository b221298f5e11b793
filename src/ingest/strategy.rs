use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::config::IngestConfig;
use crate::ingest::format_detection::FileFormat;

/// How a file's content reaches its decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The whole content is read into memory, then decoded
    Whole,
    /// Content arrives as line chunks with progress events
    Streamed,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole => f.write_str("whole"),
            Self::Streamed => f.write_str("streamed"),
        }
    }
}

/// A single load, as planned by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionRequest {
    pub path: PathBuf,
    pub format: FileFormat,
    pub size_bytes: u64,
    pub strategy: Strategy,
}

/// Stream text alignments above the configured threshold; read everything else whole
#[must_use]
pub fn select_strategy(format: FileFormat, size_bytes: u64, config: &IngestConfig) -> Strategy {
    if format.is_streamable() && size_bytes > config.streaming_threshold_bytes {
        Strategy::Streamed
    } else {
        Strategy::Whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::format_detection::AlignmentEncoding;

    #[test]
    fn test_select_strategy() {
        let config = IngestConfig {
            streaming_threshold_bytes: 1000,
            ..IngestConfig::default()
        };
        let sam = FileFormat::Alignment(AlignmentEncoding::Text);

        assert_eq!(select_strategy(sam, 1000, &config), Strategy::Whole);
        assert_eq!(select_strategy(sam, 1001, &config), Strategy::Streamed);
        // Only text alignments stream
        assert_eq!(select_strategy(FileFormat::Variant, 1 << 40, &config), Strategy::Whole);
        assert_eq!(
            select_strategy(FileFormat::Alignment(AlignmentEncoding::Binary), 1 << 40, &config),
            Strategy::Whole
        );
    }
}
