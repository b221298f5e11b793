//! Decoder for SAM text alignments.
//!
//! Reads are decoded into memory, grouped by reference. Each reference keeps at
//! most `max_reads_per_reference` reads; later ones are dropped and the cap is
//! reported once per reference, both as a `tracing` warning and as a
//! [`DecodeWarning::PerChromosomeCapExceeded`].
//!
//! Unplaced records (`RNAME` of `*` or `POS` of 0) are skipped.

use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::config::DEFAULT_MAX_READS_PER_REFERENCE;
use crate::core::read::Read;
use crate::core::types::{ChromId, Strand, ZeroBasedSpan};
use crate::parsing::{DecodeStats, DecodeWarning, Decoded, LineDecoder};

/// FLAG bit marking a reverse-complemented read
pub const FLAG_REVERSE: u16 = 0x10;

/// Mandatory SAM columns
const SAM_COLUMNS: usize = 11;

#[derive(Debug)]
pub struct SamDecoder {
    max_reads_per_reference: usize,
    reads: BTreeMap<ChromId, Vec<Read>>,
    capped: BTreeSet<ChromId>,
    stats: DecodeStats,
}

impl Default for SamDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_READS_PER_REFERENCE)
    }
}

/// Why a SAM line produced no read
enum Skip {
    Unplaced,
    Malformed(String),
}

impl SamDecoder {
    #[must_use]
    pub fn new(max_reads_per_reference: usize) -> Self {
        Self {
            max_reads_per_reference,
            reads: BTreeMap::new(),
            capped: BTreeSet::new(),
            stats: DecodeStats::default(),
        }
    }

    fn keep(&mut self, read: Read) {
        let reads = self.reads.entry(read.chromosome.clone()).or_default();
        if reads.len() < self.max_reads_per_reference {
            reads.push(read);
            self.stats.records += 1;
            return;
        }

        self.stats.dropped += 1;
        if self.capped.insert(read.chromosome.clone()) {
            warn!(
                reference = %read.chromosome,
                cap = self.max_reads_per_reference,
                "Read cap reached; further reads on this reference are dropped"
            );
            self.stats.warn(DecodeWarning::PerChromosomeCapExceeded {
                chromosome: read.chromosome,
                cap: self.max_reads_per_reference,
            });
        }
    }
}

/// Reference bases consumed by a CIGAR string (`M`, `D`, `N`, `=`, `X`)
#[must_use]
pub fn cigar_reference_length(cigar: &str) -> u64 {
    let mut total: u64 = 0;
    let mut count: u64 = 0;
    for c in cigar.chars() {
        if let Some(digit) = c.to_digit(10) {
            count = count.saturating_mul(10).saturating_add(u64::from(digit));
        } else {
            if matches!(c, 'M' | 'D' | 'N' | '=' | 'X') {
                total = total.saturating_add(count);
            }
            count = 0;
        }
    }
    total
}

fn parse_sam_line(line: &str) -> Result<Read, Skip> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < SAM_COLUMNS {
        return Err(Skip::Malformed(format!(
            "expected at least {SAM_COLUMNS} columns, found {}",
            fields.len()
        )));
    }

    let flag: u16 = fields[1]
        .parse()
        .map_err(|_| Skip::Malformed(format!("invalid FLAG '{}'", fields[1])))?;
    let pos: u64 = fields[3]
        .parse()
        .map_err(|_| Skip::Malformed(format!("invalid POS '{}'", fields[3])))?;
    if fields[2] == "*" || pos == 0 {
        return Err(Skip::Unplaced);
    }
    let mapping_quality: u8 = fields[4].parse().unwrap_or(255);

    let cigar = fields[5];
    let sequence = fields[9];
    let start = pos - 1;
    // Without a stored sequence the CIGAR is the only length source
    let length = if sequence == "*" {
        cigar_reference_length(cigar).max(1)
    } else {
        sequence.len() as u64
    };
    let end = start
        .checked_add(length)
        .ok_or_else(|| Skip::Malformed(format!("POS {pos} out of range")))?;

    Ok(Read {
        id: fields[0].to_string(),
        chromosome: fields[2].to_string(),
        span: ZeroBasedSpan::new(start, end),
        strand: if flag & FLAG_REVERSE != 0 {
            Strand::Reverse
        } else {
            Strand::Forward
        },
        mapping_quality,
        cigar: cigar.to_string(),
        sequence: sequence.to_string(),
        quality: fields[10].to_string(),
    })
}

impl LineDecoder for SamDecoder {
    fn push_line(&mut self, line: &str) {
        self.stats.lines += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('@') {
            return;
        }

        match parse_sam_line(line) {
            Ok(read) => self.keep(read),
            Err(Skip::Unplaced) => {}
            Err(Skip::Malformed(reason)) => self.stats.malformed(reason),
        }
    }

    fn finish(self: Box<Self>) -> Decoded {
        Decoded {
            reads: Some(self.reads),
            stats: self.stats,
            ..Decoded::default()
        }
    }

    fn lines_seen(&self) -> u64 {
        self.stats.lines
    }
}

/// Decode SAM text in one pass with the default per-reference cap
pub fn parse_sam_text(text: &str) -> Decoded {
    crate::parsing::decode_text(Box::new(SamDecoder::default()), text)
}
