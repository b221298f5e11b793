//! Decoder for GFF3 and GTF interval annotation.
//!
//! Both dialects share the 9 tab-separated columns
//! `seqid source type start end score strand phase attributes`, with 1-based
//! inclusive coordinates that are kept as-is. They differ only in the attribute
//! column:
//!
//! - GFF3: `ID=gene0;Name=thrL;Dbxref=GeneID:1,ASAP:2`
//! - GTF: `gene_id "thrL"; transcript_id "thrL.1";`
//!
//! A GFF3 `##FASTA` directive switches the rest of the file to embedded FASTA.

use std::collections::BTreeMap;

use crate::core::feature::{Feature, Qualifiers};
use crate::core::types::{ChromId, OneBasedSpan, Strand};
use crate::parsing::fasta::FastaDecoder;
use crate::parsing::{parse_optional_f64, DecodeStats, Decoded, LineDecoder};

/// Attributes consulted, in order, for a feature's display name
pub const NAME_ATTRIBUTES: &[&str] = &["Name", "ID", "gene_name", "gene_id"];

#[derive(Debug, Default)]
pub struct GffDecoder {
    annotations: BTreeMap<ChromId, Vec<Feature>>,
    /// Set once `##FASTA` is seen
    fasta: Option<Box<FastaDecoder>>,
    stats: DecodeStats,
}

impl GffDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_feature(&mut self, line: &str) -> Option<(ChromId, Feature)> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            self.stats.malformed(format!(
                "expected 9 columns, found {}",
                fields.len()
            ));
            return None;
        }

        let (Ok(start), Ok(end)) = (fields[3].trim().parse::<u64>(), fields[4].trim().parse::<u64>())
        else {
            self.stats.malformed("non-numeric start or end");
            return None;
        };
        let Some(span) = OneBasedSpan::new(start, end) else {
            self.stats.malformed("position 0 in a 1-based coordinate");
            return None;
        };

        let mut feature = Feature::new(fields[2], span, Strand::parse(fields[6].trim()))
            .with_source(fields[1]);
        feature.score = parse_optional_f64(fields[5]);

        let phase = fields[7].trim();
        if !phase.is_empty() && phase != "." {
            feature.qualifiers.insert("phase", phase);
        }
        parse_attributes(fields[8], &mut feature.qualifiers);
        feature.derive_name(NAME_ATTRIBUTES);

        Some((fields[0].to_string(), feature))
    }
}

/// Parse a GFF3 or GTF attribute column into `qualifiers`
pub fn parse_attributes(column: &str, qualifiers: &mut Qualifiers) {
    for attribute in column.split(';') {
        let attribute = attribute.trim();
        if attribute.is_empty() || attribute == "." {
            continue;
        }

        if let Some((key, value)) = attribute.split_once('=') {
            qualifiers.insert(key.trim(), value.trim());
        } else if let Some((key, value)) = attribute.split_once(char::is_whitespace) {
            qualifiers.insert(key, value.trim().trim_matches('"'));
        } else {
            qualifiers.insert(attribute, "");
        }
    }
}

impl LineDecoder for GffDecoder {
    fn push_line(&mut self, line: &str) {
        if let Some(fasta) = &mut self.fasta {
            fasta.push_line(line);
            return;
        }

        self.stats.lines += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return;
        }
        if line.starts_with("##FASTA") {
            self.fasta = Some(Box::new(FastaDecoder::new()));
            return;
        }
        if line.starts_with('#') {
            return;
        }

        if let Some((chromosome, feature)) = self.parse_feature(line) {
            self.stats.records += 1;
            self.annotations.entry(chromosome).or_default().push(feature);
        }
    }

    fn finish(self: Box<Self>) -> Decoded {
        let mut stats = self.stats;
        let sequences = match self.fasta {
            Some(fasta) => {
                let embedded = fasta.finish();
                stats.lines += embedded.stats.lines;
                stats.malformed += embedded.stats.malformed;
                embedded.sequences
            }
            None => Vec::new(),
        };

        Decoded {
            sequences,
            annotations: self.annotations,
            stats,
            ..Decoded::default()
        }
    }

    fn lines_seen(&self) -> u64 {
        self.stats.lines + self.fasta.as_ref().map_or(0, |f| f.lines_seen())
    }
}

/// Decode GFF/GTF text in one pass
pub fn parse_gff_text(text: &str) -> Decoded {
    crate::parsing::decode_text(Box::new(GffDecoder::new()), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feature::QualifierValue;

    #[test]
    fn test_parse_gff3() {
        let text = "##gff-version 3\n\
            chr1\tRefSeq\tgene\t190\t255\t.\t+\t.\tID=gene-thrL;Name=thrL;Dbxref=GeneID:1\n\
            chr1\tRefSeq\tCDS\t337\t2799\t12.5\t-\t0\tID=cds-1;Parent=gene-thrA\n";
        let decoded = parse_gff_text(text);

        let features = &decoded.annotations["chr1"];
        assert_eq!(features.len(), 2);

        let gene = &features[0];
        assert_eq!(gene.kind, "gene");
        assert_eq!(gene.source, "RefSeq");
        assert_eq!((gene.start(), gene.end()), (190, 255));
        assert_eq!(gene.strand, Strand::Forward);
        assert_eq!(gene.score, None);
        assert_eq!(gene.name.as_deref(), Some("thrL"));
        assert_eq!(gene.qualifiers.first("Dbxref"), Some("GeneID:1"));

        let cds = &features[1];
        assert_eq!(cds.strand, Strand::Reverse);
        assert_eq!(cds.score, Some(12.5));
        assert_eq!(cds.qualifiers.first("phase"), Some("0"));
        // No Name attribute, falls back to ID
        assert_eq!(cds.name.as_deref(), Some("cds-1"));
    }

    #[test]
    fn test_parse_gtf_attributes() {
        let text = "chr2\tensembl\texon\t11\t20\t.\t+\t.\tgene_id \"ENSG1\"; transcript_id \"ENST1\"; tag \"basic\"; tag \"CCDS\";\n";
        let decoded = parse_gff_text(text);
        let exon = &decoded.annotations["chr2"][0];
        assert_eq!(exon.qualifiers.first("transcript_id"), Some("ENST1"));
        assert_eq!(
            exon.qualifiers.get("tag"),
            Some(&QualifierValue::Multiple(vec![
                "basic".to_string(),
                "CCDS".to_string()
            ]))
        );
        assert_eq!(exon.name.as_deref(), Some("ENSG1"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let text = "chr1\tsrc\tgene\t1\t10\n\
            chr1\tsrc\tgene\tx\t10\t.\t+\t.\tID=a\n\
            chr1\tsrc\tgene\t5\t10\t.\t+\t.\tID=b\n";
        let decoded = parse_gff_text(text);
        assert_eq!(decoded.feature_count(), 1);
        assert_eq!(decoded.stats.malformed, 2);
    }

    #[test]
    fn test_embedded_fasta() {
        let text = "chr1\tsrc\tgene\t1\t4\t.\t+\t.\tID=g\n##FASTA\n>chr1\nacgt\n";
        let decoded = parse_gff_text(text);
        assert_eq!(decoded.feature_count(), 1);
        assert_eq!(decoded.sequences, vec![("chr1".to_string(), "ACGT".to_string())]);
    }
}
