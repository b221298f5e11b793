//! BAM provider backed by `noodles`.
//!
//! Opening reads only the header. Every fetch reopens the file and scans its
//! records linearly, keeping reads that overlap the requested region, so a
//! handle holds no file descriptor between fetches.

use noodles::bam;
use noodles::sam::alignment::record::cigar::op::Kind;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::alignment::{AlignmentError, AlignmentIndex, BinaryAlignmentOpener, ReferenceInfo};
use crate::config::DEFAULT_MAX_READS_PER_REFERENCE;
use crate::core::read::Read;
use crate::core::types::{Strand, ZeroBasedSpan};

/// Phred offset of printable quality strings
const PHRED_OFFSET: u8 = 33;

/// Opens BAM files with `noodles`
#[derive(Debug, Clone)]
pub struct NoodlesBamOpener {
    max_reads_per_fetch: usize,
}

impl Default for NoodlesBamOpener {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_READS_PER_REFERENCE)
    }
}

impl NoodlesBamOpener {
    #[must_use]
    pub fn new(max_reads_per_fetch: usize) -> Self {
        Self {
            max_reads_per_fetch,
        }
    }
}

impl BinaryAlignmentOpener for NoodlesBamOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn AlignmentIndex>, AlignmentError> {
        let mut reader = File::open(path).map(bam::io::Reader::new)?;
        let header = reader
            .read_header()
            .map_err(|e| AlignmentError::InvalidFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let references: Vec<ReferenceInfo> = header
            .reference_sequences()
            .iter()
            .map(|(name, map)| ReferenceInfo {
                name: name.to_string(),
                length: map.length().get() as u64,
            })
            .collect();

        let has_index = index_path(path).is_some();
        debug!(
            path = %path.display(),
            references = references.len(),
            has_index,
            "Opened BAM header"
        );

        Ok(Box::new(BamAlignmentIndex {
            path: path.to_path_buf(),
            references,
            has_index,
            max_reads_per_fetch: self.max_reads_per_fetch,
        }))
    }
}

/// Companion `.bai` file of a BAM, if present (`x.bam.bai` or `x.bai`)
#[must_use]
pub fn index_path(path: &Path) -> Option<PathBuf> {
    let mut appended = path.as_os_str().to_os_string();
    appended.push(".bai");
    let candidates = [PathBuf::from(appended), path.with_extension("bai")];
    candidates.into_iter().find(|p| p.is_file())
}

/// An opened BAM file
#[derive(Debug)]
pub struct BamAlignmentIndex {
    path: PathBuf,
    references: Vec<ReferenceInfo>,
    has_index: bool,
    max_reads_per_fetch: usize,
}

impl BamAlignmentIndex {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn cigar_char(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

/// Convert one record into a `Read`; `None` for unplaced or undecodable records
fn to_read(record: &bam::Record, chromosome: &str) -> Option<Read> {
    let start = record.alignment_start()?.ok()?.get() as u64 - 1;

    let mut cigar = String::new();
    let mut reference_length = 0u64;
    for op in record.cigar().iter() {
        let op = op.ok()?;
        cigar.push_str(&op.len().to_string());
        cigar.push(cigar_char(op.kind()));
        if op.kind().consumes_reference() {
            reference_length += op.len() as u64;
        }
    }
    if cigar.is_empty() {
        cigar.push('*');
    }

    let sequence: String = record.sequence().iter().map(char::from).collect();
    let scores = record.quality_scores();
    let raw_scores: &[u8] = scores.as_ref();
    let quality: String = if raw_scores.is_empty() || raw_scores.iter().all(|&q| q == 0xff) {
        "*".to_string()
    } else {
        raw_scores
            .iter()
            .map(|&q| char::from(q.saturating_add(PHRED_OFFSET)))
            .collect()
    };

    let length = if reference_length > 0 {
        reference_length
    } else {
        (sequence.len() as u64).max(1)
    };

    Some(Read {
        id: record.name().map(|n| n.to_string()).unwrap_or_default(),
        chromosome: chromosome.to_string(),
        span: ZeroBasedSpan::new(start, start + length),
        strand: if record.flags().is_reverse_complemented() {
            Strand::Reverse
        } else {
            Strand::Forward
        },
        mapping_quality: record.mapping_quality().map_or(255, |q| q.get()),
        cigar,
        sequence: if sequence.is_empty() {
            "*".to_string()
        } else {
            sequence
        },
        quality,
    })
}

impl AlignmentIndex for BamAlignmentIndex {
    fn has_index(&self) -> bool {
        self.has_index
    }

    fn references(&self) -> &[ReferenceInfo] {
        &self.references
    }

    fn fetch_reads(
        &self,
        chromosome: &str,
        region: ZeroBasedSpan,
    ) -> Result<Vec<Read>, AlignmentError> {
        let target = self
            .references
            .iter()
            .position(|r| r.name == chromosome)
            .ok_or_else(|| AlignmentError::UnknownReference(chromosome.to_string()))?;

        let mut reader = File::open(&self.path).map(bam::io::Reader::new)?;
        reader.read_header()?;

        let mut reads = Vec::new();
        let mut record = bam::Record::default();
        loop {
            if reader.read_record(&mut record)? == 0 {
                break;
            }
            if record.flags().is_unmapped() {
                continue;
            }
            match record.reference_sequence_id() {
                Some(Ok(id)) if id == target => {}
                _ => continue,
            }
            let Some(read) = to_read(&record, chromosome) else {
                continue;
            };
            if !read.span.overlaps(&region) {
                continue;
            }

            if reads.len() >= self.max_reads_per_fetch {
                warn!(
                    reference = %chromosome,
                    cap = self.max_reads_per_fetch,
                    "Read cap reached for region; remaining reads not returned"
                );
                break;
            }
            reads.push(read);
        }

        debug!(
            reference = %chromosome,
            start = region.start,
            end = region.end,
            reads = reads.len(),
            "Fetched BAM region"
        );
        Ok(reads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let bam = dir.path().join("reads.bam");
        std::fs::write(&bam, b"").unwrap();
        assert_eq!(index_path(&bam), None);

        let bai = dir.path().join("reads.bam.bai");
        std::fs::write(&bai, b"").unwrap();
        assert_eq!(index_path(&bam), Some(bai));
    }

    #[test]
    fn test_open_rejects_non_bam() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bam");
        std::fs::write(&path, b"this is not bgzf").unwrap();
        assert!(NoodlesBamOpener::default().open(&path).is_err());
    }

    #[test]
    fn test_cigar_chars() {
        assert_eq!(cigar_char(Kind::Match), 'M');
        assert_eq!(cigar_char(Kind::SoftClip), 'S');
        assert_eq!(cigar_char(Kind::SequenceMismatch), 'X');
    }
}
