//! Decoder for multi-record FASTA sequence files.
//!
//! A record starts at a `>` line; its identifier is the first whitespace-delimited
//! token after `>` (any description is discarded). Sequence lines up to the next
//! record are concatenated and upper-cased.

use crate::parsing::{DecodeStats, Decoded, LineDecoder};

#[derive(Debug, Default)]
pub struct FastaDecoder {
    current: Option<(String, String)>,
    records: Vec<(String, String)>,
    /// Set after a header without an identifier; its sequence lines are dropped
    skipping: bool,
    stats: DecodeStats,
}

impl FastaDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&mut self) {
        if let Some(record) = self.current.take() {
            self.stats.records += 1;
            self.records.push(record);
        }
    }
}

impl LineDecoder for FastaDecoder {
    fn push_line(&mut self, line: &str) {
        self.stats.lines += 1;
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }

        if let Some(header) = line.strip_prefix('>') {
            self.flush();
            match header.split_whitespace().next() {
                Some(id) => {
                    self.current = Some((id.to_string(), String::new()));
                    self.skipping = false;
                }
                None => {
                    self.stats.malformed("FASTA header without identifier");
                    self.skipping = true;
                }
            }
            return;
        }

        match &mut self.current {
            Some((_, sequence)) => sequence.extend(
                line.chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| c.to_ascii_uppercase()),
            ),
            None if self.skipping => {}
            None => {
                self.stats.malformed("sequence line before first FASTA header");
                self.skipping = true;
            }
        }
    }

    fn finish(mut self: Box<Self>) -> Decoded {
        self.flush();
        Decoded {
            sequences: self.records,
            stats: self.stats,
            ..Decoded::default()
        }
    }

    fn lines_seen(&self) -> u64 {
        self.stats.lines
    }
}

/// Decode FASTA text in one pass
pub fn parse_fasta_text(text: &str) -> Decoded {
    crate::parsing::decode_text(Box::new(FastaDecoder::new()), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fasta_text() {
        let decoded = parse_fasta_text(">chr1 description\nACGTACGT\nacgt\n>chr2\nGGGG\n");
        assert_eq!(decoded.sequences.len(), 2);
        assert_eq!(decoded.sequences[0].0, "chr1");
        assert_eq!(decoded.sequences[0].1, "ACGTACGTACGT");
        assert_eq!(decoded.sequences[1].0, "chr2");
        assert_eq!(decoded.sequences[1].1, "GGGG");
        assert_eq!(decoded.stats.records, 2);
    }

    #[test]
    fn test_parse_fasta_blank_lines_and_crlf() {
        let decoded = parse_fasta_text(">seq1\r\nAC\r\n\r\nGT\r\n");
        assert_eq!(decoded.sequences, vec![("seq1".to_string(), "ACGT".to_string())]);
    }

    #[test]
    fn test_parse_fasta_empty() {
        let decoded = parse_fasta_text("");
        assert!(decoded.sequences.is_empty());
        assert_eq!(decoded.stats.malformed, 0);
    }

    #[test]
    fn test_sequence_before_header_is_skipped() {
        let decoded = parse_fasta_text("ACGT\nACGT\n>chr1\nAA\n");
        assert_eq!(decoded.sequences.len(), 1);
        assert_eq!(decoded.stats.malformed, 1);
    }

    #[test]
    fn test_header_without_identifier() {
        let decoded = parse_fasta_text(">\nACGT\n>ok\nTT\n");
        assert_eq!(decoded.sequences, vec![("ok".to_string(), "TT".to_string())]);
        assert_eq!(decoded.stats.malformed, 1);
    }
}
