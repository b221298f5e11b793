//! Line-oriented decoders for every supported text format.
//!
//! This module provides decoders for:
//!
//! - **FASTA**: multi-record raw sequence
//! - **GenBank**: annotated records with features, qualifiers and sequence
//! - **GFF/GTF**: 9-column interval annotation
//! - **BED**: 0-based interval annotation with optional `track` lines
//! - **VCF**: variant calls
//! - **SAM**: text alignments
//! - **Wiggle**: `fixedStep` / `variableStep` numeric tracks
//!
//! Every decoder implements [`LineDecoder`], so the same decoder serves a
//! whole-file read (all lines pushed at once) and a streamed read (lines pushed
//! chunk by chunk as they arrive).
//!
//! ## Malformed input
//!
//! Empty lines, comments and malformed records never abort a decode. They are
//! skipped and counted in [`DecodeStats`]; only unreadable files or unsupported
//! extensions are fatal, and those are raised by the ingestion coordinator.
//!
//! ## Example
//!
//! ```rust
//! use genome_ingest::parsing::fasta::parse_fasta_text;
//!
//! let decoded = parse_fasta_text(">chr1 description\nacgt\n>chr2\nGG\n");
//! assert_eq!(decoded.sequences.len(), 2);
//! assert_eq!(decoded.sequences[0], ("chr1".to_string(), "ACGT".to_string()));
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::feature::Feature;
use crate::core::read::Read;
use crate::core::track::Track;
use crate::core::types::ChromId;
use crate::core::variant::Variant;

pub mod bed;
pub mod fasta;
pub mod genbank;
pub mod gff;
pub mod location;
pub mod sam;
pub mod vcf;
pub mod wig;

/// Individual warnings kept per decode; further ones are only counted
pub const MAX_RECORDED_WARNINGS: usize = 100;

/// A non-fatal problem met while decoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// A record was skipped because it could not be decoded
    RecordMalformed { line: u64, reason: String },
    /// The per-reference read cap was reached; later reads were dropped
    PerChromosomeCapExceeded { chromosome: String, cap: usize },
}

/// Counters collected by a decoder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Lines seen (including skipped ones)
    pub lines: u64,
    /// Records produced
    pub records: u64,
    /// Records skipped as malformed
    pub malformed: u64,
    /// Records dropped by a cap
    pub dropped: u64,
    pub warnings: Vec<DecodeWarning>,
}

impl DecodeStats {
    /// Record a skipped record at the current line
    pub fn malformed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(line = self.lines, reason = %reason, "Skipping malformed record");
        self.malformed += 1;
        self.warn(DecodeWarning::RecordMalformed {
            line: self.lines,
            reason,
        });
    }

    pub fn warn(&mut self, warning: DecodeWarning) {
        if self.warnings.len() < MAX_RECORDED_WARNINGS {
            self.warnings.push(warning);
        }
    }
}

/// Entities produced by one decode, ready to be merged into a dataset
#[derive(Debug, Default)]
pub struct Decoded {
    /// Sequences in file order (a repeated id appears twice; the later one wins on merge)
    pub sequences: Vec<(ChromId, String)>,
    pub annotations: BTreeMap<ChromId, Vec<Feature>>,
    pub variants: BTreeMap<ChromId, Vec<Variant>>,
    pub tracks: Vec<Track>,
    /// In-memory alignment reads; `Some` only when an alignment decoder ran
    pub reads: Option<BTreeMap<ChromId, Vec<Read>>>,
    pub stats: DecodeStats,
}

impl Decoded {
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.annotations.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads
            .as_ref()
            .map_or(0, |reads| reads.values().map(Vec::len).sum())
    }
}

/// A line-driven decoder for one file format
pub trait LineDecoder: Send {
    /// Feed the next line, without its line terminator
    fn push_line(&mut self, line: &str);

    /// Flush pending state and hand over everything decoded
    fn finish(self: Box<Self>) -> Decoded;

    /// Lines consumed so far
    fn lines_seen(&self) -> u64;
}

/// Run a decoder over a whole text buffer
pub fn decode_text(mut decoder: Box<dyn LineDecoder>, text: &str) -> Decoded {
    for line in text.lines() {
        decoder.push_line(line);
    }
    decoder.finish()
}

/// Split a `track` / declaration line into `key=value` pairs.
///
/// Values may be double-quoted and contain spaces (`name="My Track"`); quotes are
/// removed. Bare words without `=` (the leading `track` keyword) are skipped.
pub fn parse_key_value_words(line: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut word = String::new();
    let mut in_quotes = false;

    let mut flush = |word: &mut String| {
        if let Some((key, value)) = word.split_once('=') {
            pairs.push((key.to_string(), value.trim_matches('"').to_string()));
        }
        word.clear();
    };

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                word.push(c);
            }
            c if c.is_whitespace() && !in_quotes => flush(&mut word),
            c => word.push(c),
        }
    }
    flush(&mut word);

    pairs
}

/// Parse a float column, treating `.` and empty as missing
pub(crate) fn parse_optional_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "." {
        return None;
    }
    s.parse().ok()
}
