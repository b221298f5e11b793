//! Decoder for wiggle numeric tracks.
//!
//! ```text
//! track type=wiggle_0 name="Signal" color=0,0,255 autoScale=on
//! fixedStep chrom=chr1 start=1 step=10 span=5
//! 0.5
//! 0.7
//! variableStep chrom=chr2 span=3
//! 101 1.5
//! ```
//!
//! Wiggle positions are 1-based; every value becomes a 0-based half-open bin
//! `[pos - 1, pos - 1 + span)`. In `fixedStep` blocks the position advances by
//! `step` after each value. A declaration without a preceding `track` line opens
//! a track named after the file stem.

use crate::core::track::{DeclarationKind, Track, TrackMetadata};
use crate::core::types::ZeroBasedSpan;
use crate::parsing::{parse_key_value_words, DecodeStats, Decoded, LineDecoder};

/// Name of tracks when neither a `track name=` nor a file stem is known
pub const DEFAULT_TRACK_NAME: &str = "track";

/// Active data block
#[derive(Debug, Clone, PartialEq, Eq)]
enum Declaration {
    Fixed {
        chromosome: String,
        /// 0-based start of the next value
        next_start: u64,
        step: u64,
        span: u64,
    },
    Variable {
        chromosome: String,
        span: u64,
    },
}

#[derive(Debug)]
pub struct WigDecoder {
    default_name: String,
    tracks: Vec<Track>,
    current: Option<Track>,
    /// Whether the current track has seen its first declaration
    kind_fixed: bool,
    declaration: Option<Declaration>,
    stats: DecodeStats,
}

impl Default for WigDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_TRACK_NAME)
    }
}

impl WigDecoder {
    /// `default_name` is used for tracks without a `name=` (usually the file stem)
    #[must_use]
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into(),
            tracks: Vec::new(),
            current: None,
            kind_fixed: false,
            declaration: None,
            stats: DecodeStats::default(),
        }
    }

    fn close_track(&mut self) {
        if let Some(track) = self.current.take() {
            if track.interval_count() > 0 {
                self.stats.records += 1;
                self.tracks.push(track);
            }
        }
        self.kind_fixed = false;
        self.declaration = None;
    }

    fn open_track(&mut self, line: &str) {
        self.close_track();

        let mut name = None;
        let mut metadata = TrackMetadata::default();
        for (key, value) in parse_key_value_words(line) {
            match key.as_str() {
                "name" => name = Some(value),
                "description" => metadata.description = Some(value),
                "color" => metadata.color = Some(value),
                "autoScale" => metadata.auto_scale = value.eq_ignore_ascii_case("on"),
                _ => {
                    metadata.extra.insert(key, value);
                }
            }
        }

        let name = name.unwrap_or_else(|| self.default_name.clone());
        let mut track = Track::new(name, DeclarationKind::FixedStep);
        track.metadata = metadata;
        self.current = Some(track);
    }

    fn declare(&mut self, line: &str) {
        let pairs = parse_key_value_words(line);
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        let number = |key: &str, default: u64| -> Option<u64> {
            match get(key) {
                Some(v) => v.parse().ok().filter(|n| *n > 0),
                None => Some(default),
            }
        };

        let Some(chromosome) = get("chrom").map(str::to_string) else {
            self.stats.malformed("declaration without chrom=");
            self.declaration = None;
            return;
        };

        let (declaration, kind) = if line.starts_with("fixedStep") {
            match (number("start", 1), number("step", 1), number("span", 1)) {
                (Some(start), Some(step), Some(span)) => (
                    Declaration::Fixed {
                        chromosome,
                        next_start: start - 1,
                        step,
                        span,
                    },
                    DeclarationKind::FixedStep,
                ),
                _ => {
                    self.stats.malformed("invalid fixedStep start/step/span");
                    self.declaration = None;
                    return;
                }
            }
        } else {
            match number("span", 1) {
                Some(span) => (
                    Declaration::Variable { chromosome, span },
                    DeclarationKind::VariableStep,
                ),
                None => {
                    self.stats.malformed("invalid variableStep span");
                    self.declaration = None;
                    return;
                }
            }
        };

        let track = self
            .current
            .get_or_insert_with(|| Track::new(self.default_name.clone(), kind));
        if !self.kind_fixed {
            track.declaration_kind = kind;
            self.kind_fixed = true;
        }
        self.declaration = Some(declaration);
    }

    fn push_value(&mut self, line: &str) {
        let (Some(track), Some(declaration)) = (&mut self.current, &mut self.declaration) else {
            self.stats.malformed("data line before any declaration");
            return;
        };

        match declaration {
            Declaration::Fixed {
                chromosome,
                next_start,
                step,
                span,
            } => {
                let Ok(value) = line.trim().parse::<f64>() else {
                    self.stats.malformed(format!("invalid value '{}'", line.trim()));
                    return;
                };
                let start = *next_start;
                // Saturated starts fail the span check of every later value
                *next_start = start.saturating_add(*step);
                let Some(end) = start.checked_add(*span) else {
                    self.stats.malformed(format!("fixedStep position {start} out of range"));
                    return;
                };
                track.push(chromosome, ZeroBasedSpan::new(start, end), value);
            }
            Declaration::Variable { chromosome, span } => {
                let mut parts = line.split_whitespace();
                let parsed = match (parts.next(), parts.next()) {
                    (Some(pos), Some(value)) => pos
                        .parse::<u64>()
                        .ok()
                        .filter(|p| *p > 0)
                        .zip(value.parse::<f64>().ok()),
                    _ => None,
                };
                let Some((pos, value)) = parsed else {
                    self.stats.malformed(format!("invalid variableStep line '{}'", line.trim()));
                    return;
                };
                let start = pos - 1;
                let Some(end) = start.checked_add(*span) else {
                    self.stats.malformed(format!("variableStep position {pos} out of range"));
                    return;
                };
                track.push(chromosome, ZeroBasedSpan::new(start, end), value);
            }
        }
    }
}

impl LineDecoder for WigDecoder {
    fn push_line(&mut self, line: &str) {
        self.stats.lines += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("browser") {
            return;
        }

        if line.starts_with("track") {
            self.open_track(line);
        } else if line.starts_with("fixedStep") || line.starts_with("variableStep") {
            self.declare(line);
        } else {
            self.push_value(line);
        }
    }

    fn finish(mut self: Box<Self>) -> Decoded {
        self.close_track();
        Decoded {
            tracks: self.tracks,
            stats: self.stats,
            ..Decoded::default()
        }
    }

    fn lines_seen(&self) -> u64 {
        self.stats.lines
    }
}

/// Decode wiggle text in one pass; unnamed tracks take `default_name`
pub fn parse_wig_text(text: &str, default_name: &str) -> Decoded {
    crate::parsing::decode_text(Box::new(WigDecoder::new(default_name)), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step() {
        let text = "track type=wiggle_0 name=\"Signal\" description=\"GC content\" color=0,0,255 autoScale=on visibility=full\n\
            fixedStep chrom=chr1 start=11 step=10 span=5\n\
            0.5\n\
            0.75\n\
            1\n";
        let decoded = parse_wig_text(text, "file");
        assert_eq!(decoded.tracks.len(), 1);

        let track = &decoded.tracks[0];
        assert_eq!(track.name, "Signal");
        assert_eq!(track.declaration_kind, DeclarationKind::FixedStep);
        assert_eq!(track.metadata.description.as_deref(), Some("GC content"));
        assert_eq!(track.metadata.color.as_deref(), Some("0,0,255"));
        assert!(track.metadata.auto_scale);
        assert_eq!(track.metadata.extra.get("visibility").map(String::as_str), Some("full"));
        assert_eq!(track.metadata.extra.get("type").map(String::as_str), Some("wiggle_0"));

        let bins = &track.per_chromosome["chr1"];
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0].span, ZeroBasedSpan::new(10, 15));
        assert_eq!(bins[1].span, ZeroBasedSpan::new(20, 25));
        assert_eq!(bins[2].value, 1.0);
    }

    #[test]
    fn test_variable_step_and_file_stem_name() {
        let text = "variableStep chrom=chr2 span=3\n101 1.5\n201\t2.5\n";
        let decoded = parse_wig_text(text, "coverage");
        let track = &decoded.tracks[0];
        assert_eq!(track.name, "coverage");
        assert_eq!(track.declaration_kind, DeclarationKind::VariableStep);

        let bins = &track.per_chromosome["chr2"];
        assert_eq!(bins[0].span, ZeroBasedSpan::new(100, 103));
        assert_eq!(bins[1].span, ZeroBasedSpan::new(200, 203));
        assert_eq!(bins[1].value, 2.5);
    }

    #[test]
    fn test_declaration_kind_is_first_seen() {
        let text = "track name=mixed\n\
            variableStep chrom=chr1\n5 1\n\
            fixedStep chrom=chr1 start=100 step=1\n2\n";
        let decoded = parse_wig_text(text, "f");
        let track = &decoded.tracks[0];
        assert_eq!(track.declaration_kind, DeclarationKind::VariableStep);
        assert_eq!(track.interval_count(), 2);
    }

    #[test]
    fn test_multiple_tracks_and_malformed() {
        let text = "1.0\n\
            track name=A\nfixedStep chrom=chr1 start=1 step=1\n1\nabc\n\
            track name=B\nfixedStep start=1\n2\n\
            variableStep chrom=chr3\n7 3\n";
        let decoded = parse_wig_text(text, "f");
        let names: Vec<&str> = decoded.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        // orphan value, bad value, missing chrom, value after rejected declaration
        assert_eq!(decoded.stats.malformed, 4);
        assert_eq!(decoded.tracks[1].per_chromosome["chr3"].len(), 1);
    }

    #[test]
    fn test_positions_past_u64_range_are_malformed() {
        let text = "fixedStep chrom=chr1 start=1 step=18446744073709551615\n1\n2\n3\n\
            variableStep chrom=chr2 span=5\n18446744073709551615 1\n10 2\n";
        let decoded = parse_wig_text(text, "f");
        let track = &decoded.tracks[0];
        assert_eq!(track.per_chromosome["chr1"].len(), 1);
        assert_eq!(track.per_chromosome["chr2"].len(), 1);
        assert_eq!(decoded.stats.malformed, 3);
    }
}
