use serde::{Deserialize, Serialize};

use crate::core::types::{Strand, ZeroBasedSpan};

/// A single alignment record, 0-based half-open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Read {
    pub id: String,
    pub chromosome: String,
    pub span: ZeroBasedSpan,
    pub strand: Strand,
    pub mapping_quality: u8,
    pub cigar: String,
    pub sequence: String,
    pub quality: String,
}

impl Read {
    #[must_use]
    pub fn start(&self) -> u64 {
        self.span.start
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        self.span.end
    }
}
