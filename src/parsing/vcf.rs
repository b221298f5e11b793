//! Decoder for VCF variant calls.
//!
//! Only the 8 fixed columns are read; sample columns are ignored. `POS` is
//! 1-based, so a variant is stored as `start = POS - 1`, `end = start + len(REF)`.

use std::collections::BTreeMap;

use crate::core::types::{ChromId, ZeroBasedSpan};
use crate::core::variant::Variant;
use crate::parsing::{parse_optional_f64, DecodeStats, Decoded, LineDecoder};

#[derive(Debug, Default)]
pub struct VcfDecoder {
    variants: BTreeMap<ChromId, Vec<Variant>>,
    stats: DecodeStats,
}

impl VcfDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn optional_column(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty() && s != ".").then(|| s.to_string())
}

/// Parse one data line; `Err` carries the reason it was skipped
pub fn parse_vcf_line(line: &str) -> Result<Variant, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 8 {
        return Err(format!("expected at least 8 columns, found {}", fields.len()));
    }

    let pos: u64 = fields[1]
        .trim()
        .parse()
        .map_err(|_| format!("invalid POS '{}'", fields[1]))?;
    let reference = fields[3].trim();
    if reference.is_empty() {
        return Err("empty REF".to_string());
    }

    let start = pos.saturating_sub(1);
    let end = start
        .checked_add(reference.len() as u64)
        .ok_or_else(|| format!("POS {pos} out of range"))?;
    Ok(Variant {
        chromosome: fields[0].to_string(),
        span: ZeroBasedSpan::new(start, end),
        id: optional_column(fields[2]),
        reference: reference.to_string(),
        alternate: fields[4].trim().to_string(),
        quality: parse_optional_f64(fields[5]),
        filter: fields[6].trim().to_string(),
        info: fields[7].trim().to_string(),
    })
}

impl LineDecoder for VcfDecoder {
    fn push_line(&mut self, line: &str) {
        self.stats.lines += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            return;
        }

        match parse_vcf_line(line) {
            Ok(variant) => {
                self.stats.records += 1;
                self.variants
                    .entry(variant.chromosome.clone())
                    .or_default()
                    .push(variant);
            }
            Err(reason) => self.stats.malformed(reason),
        }
    }

    fn finish(self: Box<Self>) -> Decoded {
        Decoded {
            variants: self.variants,
            stats: self.stats,
            ..Decoded::default()
        }
    }

    fn lines_seen(&self) -> u64 {
        self.stats.lines
    }
}

/// Decode VCF text in one pass
pub fn parse_vcf_text(text: &str) -> Decoded {
    crate::parsing::decode_text(Box::new(VcfDecoder::new()), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_base_variant() {
        let decoded = parse_vcf_text("chr1\t100\t.\tA\tG\t.\t.\t.\n");
        let variant = &decoded.variants["chr1"][0];
        assert_eq!(variant.start(), 99);
        assert_eq!(variant.end(), 100);
        assert_eq!(variant.id, None);
        assert_eq!(variant.quality, None);
        assert_eq!(variant.reference, "A");
        assert_eq!(variant.alternate, "G");
    }

    #[test]
    fn test_header_and_sample_columns() {
        let text = "##fileformat=VCFv4.2\n\
            #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
            chr2\t1000\trs123\tACGT\tA\t50.5\tPASS\tDP=30\tGT\t0/1\n";
        let decoded = parse_vcf_text(text);
        assert_eq!(decoded.variant_count(), 1);

        let variant = &decoded.variants["chr2"][0];
        assert_eq!((variant.start(), variant.end()), (999, 1003));
        assert_eq!(variant.id.as_deref(), Some("rs123"));
        assert_eq!(variant.quality, Some(50.5));
        assert_eq!(variant.filter, "PASS");
        assert_eq!(variant.info, "DP=30");
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let text = "chr1\t100\t.\tA\tG\n\
            chr1\tx\t.\tA\tG\t.\t.\t.\n\
            chr1\t5\t.\tA\tT\t.\t.\t.\n";
        let decoded = parse_vcf_text(text);
        assert_eq!(decoded.variant_count(), 1);
        assert_eq!(decoded.stats.malformed, 2);
    }

    #[test]
    fn test_position_past_u64_range_is_malformed() {
        let text = "chr1\t18446744073709551615\t.\tAC\tG\t.\t.\t.\n\
            chr1\t7\t.\tA\tT\t.\t.\t.\n";
        let decoded = parse_vcf_text(text);
        assert_eq!(decoded.variant_count(), 1);
        assert_eq!(decoded.stats.malformed, 1);
    }
}
