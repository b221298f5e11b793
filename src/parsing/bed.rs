//! Decoder for BED interval files.
//!
//! BED coordinates are 0-based half-open; features are stored 1-based inclusive,
//! so `chr1 10 20` becomes a feature spanning 11-20.
//!
//! | Column | Field | Stored as |
//! |--------|-------|-----------|
//! | 1-3 | chrom, start, end | key and span |
//! | 4 | name | `name` |
//! | 5 | score | `score` |
//! | 6 | strand | `strand` |
//! | 7-8 | thickStart, thickEnd | `thick_start` / `thick_end` qualifiers |
//! | 9 | itemRgb | `color` qualifier |
//!
//! A `track` line applies its `name`, `description` and `color` to every
//! following feature as `track_name`, `track_description` and `track_color`
//! qualifiers, until the next `track` line. `browser` lines are skipped.

use std::collections::BTreeMap;

use crate::core::feature::Feature;
use crate::core::types::{ChromId, OneBasedSpan, Strand, ZeroBasedSpan};
use crate::parsing::{parse_key_value_words, parse_optional_f64, DecodeStats, Decoded, LineDecoder};

/// Track line keys copied onto features, with the qualifier they become
const TRACK_QUALIFIERS: &[(&str, &str)] = &[
    ("name", "track_name"),
    ("description", "track_description"),
    ("color", "track_color"),
];

#[derive(Debug, Default)]
pub struct BedDecoder {
    /// Qualifiers from the most recent `track` line
    track_context: Vec<(&'static str, String)>,
    annotations: BTreeMap<ChromId, Vec<Feature>>,
    stats: DecodeStats,
}

impl BedDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn set_track_context(&mut self, line: &str) {
        let pairs = parse_key_value_words(line);
        self.track_context = TRACK_QUALIFIERS
            .iter()
            .filter_map(|(key, qualifier)| {
                pairs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| (*qualifier, v.clone()))
            })
            .collect();
    }

    fn parse_feature(&mut self, line: &str) -> Option<(ChromId, Feature)> {
        let mut fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            // Some producers separate columns with spaces
            fields = line.split_whitespace().collect();
        }
        if fields.len() < 3 {
            self.stats.malformed(format!(
                "expected at least 3 columns, found {}",
                fields.len()
            ));
            return None;
        }

        let (Ok(start), Ok(end)) = (fields[1].trim().parse::<u64>(), fields[2].trim().parse::<u64>())
        else {
            self.stats.malformed("non-numeric start or end");
            return None;
        };
        if end <= start {
            self.stats.malformed(format!("empty or inverted interval {start}-{end}"));
            return None;
        }
        let Ok(span) = OneBasedSpan::try_from(ZeroBasedSpan::new(start, end)) else {
            self.stats.malformed("empty interval");
            return None;
        };

        let field = |i: usize| fields.get(i).map(|f| f.trim()).filter(|f| !f.is_empty());
        let strand = field(5).map_or(Strand::Forward, Strand::parse);

        let mut feature = Feature::new("region", span, strand).with_source("BED");
        feature.name = field(3).filter(|n| *n != ".").map(str::to_string);
        feature.score = field(4).and_then(parse_optional_f64);
        if let (Some(thick_start), Some(thick_end)) = (field(6), field(7)) {
            feature.qualifiers.insert("thick_start", thick_start);
            feature.qualifiers.insert("thick_end", thick_end);
        }
        if let Some(rgb) = field(8).filter(|rgb| *rgb != "0") {
            feature.qualifiers.insert("color", rgb);
        }
        for (qualifier, value) in &self.track_context {
            feature.qualifiers.insert(*qualifier, value.as_str());
        }

        Some((fields[0].trim().to_string(), feature))
    }
}

impl LineDecoder for BedDecoder {
    fn push_line(&mut self, line: &str) {
        self.stats.lines += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("browser") {
            return;
        }
        if trimmed.starts_with("track") {
            self.set_track_context(trimmed);
            return;
        }

        if let Some((chromosome, feature)) = self.parse_feature(line) {
            self.stats.records += 1;
            self.annotations.entry(chromosome).or_default().push(feature);
        }
    }

    fn finish(self: Box<Self>) -> Decoded {
        Decoded {
            annotations: self.annotations,
            stats: self.stats,
            ..Decoded::default()
        }
    }

    fn lines_seen(&self) -> u64 {
        self.stats.lines
    }
}

/// Decode BED text in one pass
pub fn parse_bed_text(text: &str) -> Decoded {
    crate::parsing::decode_text(Box::new(BedDecoder::new()), text)
}
