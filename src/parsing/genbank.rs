//! Decoder for GenBank flat files (annotated records).
//!
//! GenBank is column-significant, so the decoder is an explicit state machine
//! whose transitions are keyed on the number of leading spaces of each line:
//!
//! | Indent | Content | Meaning |
//! |--------|---------|---------|
//! | 0 | `LOCUS`, `FEATURES`, `ORIGIN`, ... | section keyword |
//! | 5 | `CDS  complement(1..90)` | feature declaration |
//! | 21 | `/gene="thrL"` | qualifier |
//! | 21 | text without `/` | continuation of the previous qualifier |
//! | any | `//` | end of record |
//!
//! ```text
//!               LOCUS               FEATURES          5 spaces
//! SeekingHeader ─────> (record) ───────────> Features <────────┐
//!       ^                                     │   ^            │
//!       │ //                         21 + "/" │   │ 5 spaces   │
//!       │                                     v   │            │
//!    Sequence <────────── ORIGIN ──────────  Qualifier ────────┘
//! ```
//!
//! Location strings keep only the first sub-range of `join`/`order` (see
//! [`crate::parsing::location`]). Long qualifier values are bounded: the
//! `translation` qualifier keeps a short prefix followed by `...`, every other
//! value is capped at a byte limit after which `... [truncated]` is appended.

use std::collections::BTreeMap;

use crate::config::{DEFAULT_MAX_QUALIFIER_BYTES, DEFAULT_TRANSLATION_PREVIEW_CHARS};
use crate::core::feature::{Feature, Qualifiers};
use crate::core::types::ChromId;
use crate::parsing::location::parse_location;
use crate::parsing::{DecodeStats, Decoded, LineDecoder};

/// Indent of a feature declaration line
pub const FEATURE_INDENT: usize = 5;

/// Indent of qualifier and continuation lines
pub const QUALIFIER_INDENT: usize = 21;

/// Qualifiers whose values are abbreviated to a short preview
pub const ABBREVIATED_QUALIFIERS: &[&str] = &["translation"];

/// Qualifiers consulted, in order, for a feature's display name
pub const NAME_QUALIFIERS: &[&str] = &["gene", "locus_tag", "product"];

pub const ELLIPSIS: &str = "...";
pub const TRUNCATION_MARKER: &str = "... [truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingHeader,
    Features,
    Qualifier,
    Sequence,
}

/// One line, classified by its indentation
#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Terminator,
    Keyword(&'a str),
    FeatureStart { key: &'a str, location: &'a str },
    Qualifier { key: &'a str, value: Option<&'a str> },
    Continuation(&'a str),
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    if line.starts_with("//") {
        return LineKind::Terminator;
    }
    let rest = line.trim_start_matches(' ');
    let indent = line.len() - rest.len();
    if rest.is_empty() {
        return LineKind::Other;
    }

    match indent {
        0 => LineKind::Keyword(rest),
        FEATURE_INDENT => {
            let (key, location) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(k, l)| (k, l.trim()));
            LineKind::FeatureStart { key, location }
        }
        QUALIFIER_INDENT => match rest.strip_prefix('/') {
            Some(qualifier) => match qualifier.split_once('=') {
                Some((key, value)) => LineKind::Qualifier {
                    key,
                    value: Some(value),
                },
                None => LineKind::Qualifier {
                    key: qualifier.trim_end(),
                    value: None,
                },
            },
            None => LineKind::Continuation(rest.trim_end()),
        },
        _ => LineKind::Other,
    }
}

/// Value limits applied while a qualifier accumulates
#[derive(Debug, Clone, Copy)]
struct ValueLimits {
    max_bytes: usize,
    preview_chars: usize,
}

/// A qualifier value being accumulated across continuation lines
#[derive(Debug)]
struct QualifierBuffer {
    key: String,
    value: String,
    quoted: bool,
    abbreviated: bool,
    truncated: bool,
}

impl QualifierBuffer {
    fn new(key: &str, first: Option<&str>, limits: ValueLimits) -> Self {
        let mut buffer = Self {
            key: key.to_string(),
            value: String::new(),
            quoted: false,
            abbreviated: ABBREVIATED_QUALIFIERS.contains(&key),
            truncated: false,
        };
        if let Some(first) = first {
            let first = first.trim_end();
            let first = match first.strip_prefix('"') {
                Some(unquoted) => {
                    buffer.quoted = true;
                    unquoted
                }
                None => first,
            };
            buffer.push_piece(first, limits);
        }
        buffer
    }

    /// Append a continuation line, joined by a single space
    fn append(&mut self, text: &str, limits: ValueLimits) {
        if self.truncated {
            return;
        }
        if !self.value.is_empty() {
            self.value.push(' ');
        }
        self.push_piece(text, limits);
    }

    fn push_piece(&mut self, text: &str, limits: ValueLimits) {
        let text = if self.quoted {
            text.strip_suffix('"').unwrap_or(text)
        } else {
            text
        };
        self.value.push_str(text);

        if self.abbreviated {
            if let Some((idx, _)) = self.value.char_indices().nth(limits.preview_chars) {
                self.value.truncate(idx);
                self.truncated = true;
            }
        } else if self.value.len() > limits.max_bytes {
            let mut idx = limits.max_bytes;
            while !self.value.is_char_boundary(idx) {
                idx -= 1;
            }
            self.value.truncate(idx);
            self.truncated = true;
        }
    }

    fn finish(mut self) -> (String, String) {
        if self.truncated {
            self.value.push_str(if self.abbreviated {
                ELLIPSIS
            } else {
                TRUNCATION_MARKER
            });
        }
        (self.key, self.value)
    }
}

/// A feature whose declaration has been seen but not yet finalized
#[derive(Debug)]
struct PendingFeature {
    kind: String,
    location: String,
    qualifiers: Qualifiers,
    current: Option<QualifierBuffer>,
    seen_qualifier: bool,
}

impl PendingFeature {
    fn close_qualifier(&mut self) {
        if let Some(buffer) = self.current.take() {
            let (key, value) = buffer.finish();
            self.qualifiers.insert(key, value);
        }
    }
}

#[derive(Debug)]
struct RecordBuilder {
    id: String,
    features: Vec<Feature>,
    sequence: String,
}

/// Streaming GenBank decoder
#[derive(Debug)]
pub struct GenbankDecoder {
    state: State,
    record: Option<RecordBuilder>,
    pending: Option<PendingFeature>,
    limits: ValueLimits,
    annotations: BTreeMap<ChromId, Vec<Feature>>,
    sequences: Vec<(ChromId, String)>,
    stats: DecodeStats,
}

impl Default for GenbankDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUALIFIER_BYTES, DEFAULT_TRANSLATION_PREVIEW_CHARS)
    }
}

impl GenbankDecoder {
    #[must_use]
    pub fn new(max_qualifier_bytes: usize, translation_preview_chars: usize) -> Self {
        Self {
            state: State::SeekingHeader,
            record: None,
            pending: None,
            limits: ValueLimits {
                max_bytes: max_qualifier_bytes,
                preview_chars: translation_preview_chars,
            },
            annotations: BTreeMap::new(),
            sequences: Vec::new(),
            stats: DecodeStats::default(),
        }
    }

    fn open_record(&mut self, locus_line: &str) {
        self.close_record();
        match locus_line.split_whitespace().nth(1) {
            Some(id) => {
                self.record = Some(RecordBuilder {
                    id: id.to_string(),
                    features: Vec::new(),
                    sequence: String::new(),
                });
            }
            None => self.stats.malformed("LOCUS line without a record name"),
        }
        self.state = State::SeekingHeader;
    }

    /// Turn the pending feature into a `Feature` on the open record
    fn finalize_feature(&mut self) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        pending.close_qualifier();

        let Some(location) = parse_location(&pending.location) else {
            self.stats.malformed(format!(
                "unparseable location '{}' for {} feature",
                pending.location, pending.kind
            ));
            return;
        };

        let mut feature =
            Feature::new(pending.kind, location.span, location.strand).with_source("GenBank");
        feature.qualifiers = pending.qualifiers;
        feature.derive_name(NAME_QUALIFIERS);

        if let Some(record) = &mut self.record {
            record.features.push(feature);
        }
    }

    /// Move the open record's features into the annotation map
    fn commit_features(&mut self) {
        self.finalize_feature();
        if let Some(record) = &mut self.record {
            if !record.features.is_empty() {
                let features = std::mem::take(&mut record.features);
                self.annotations
                    .entry(record.id.clone())
                    .or_default()
                    .extend(features);
            }
        }
    }

    fn close_record(&mut self) {
        self.commit_features();
        if let Some(record) = self.record.take() {
            self.stats.records += 1;
            if !record.sequence.is_empty() {
                self.sequences.push((record.id, record.sequence));
            }
        }
        self.state = State::SeekingHeader;
    }

    fn on_seeking_header(&mut self, kind: LineKind<'_>) {
        match kind {
            LineKind::Keyword(keyword) if keyword.starts_with("LOCUS") => self.open_record(keyword),
            LineKind::Keyword(keyword) if self.record.is_some() => {
                if keyword.starts_with("FEATURES") {
                    self.state = State::Features;
                } else if keyword.starts_with("ORIGIN") {
                    self.commit_features();
                    self.state = State::Sequence;
                }
            }
            LineKind::Terminator => self.close_record(),
            _ => {}
        }
    }

    fn on_feature_table(&mut self, kind: LineKind<'_>) {
        match kind {
            LineKind::FeatureStart { key, location } => {
                self.finalize_feature();
                self.pending = Some(PendingFeature {
                    kind: key.to_string(),
                    location: location.to_string(),
                    qualifiers: Qualifiers::new(),
                    current: None,
                    seen_qualifier: false,
                });
                self.state = State::Features;
            }
            LineKind::Qualifier { key, value } => match &mut self.pending {
                Some(pending) => {
                    pending.close_qualifier();
                    pending.current = Some(QualifierBuffer::new(key, value, self.limits));
                    pending.seen_qualifier = true;
                    self.state = State::Qualifier;
                }
                None => self.stats.malformed("qualifier outside of a feature"),
            },
            LineKind::Continuation(text) => match (&mut self.pending, self.state) {
                (Some(pending), State::Qualifier) => {
                    if let Some(buffer) = &mut pending.current {
                        buffer.append(text, self.limits);
                    }
                }
                // A long location wrapped onto the next line
                (Some(pending), State::Features) if !pending.seen_qualifier => {
                    pending.location.push_str(text);
                }
                _ => self.stats.malformed("continuation line without an open value"),
            },
            LineKind::Keyword(keyword) => {
                if keyword.starts_with("LOCUS") {
                    self.open_record(keyword);
                } else if keyword.starts_with("ORIGIN") {
                    self.commit_features();
                    self.state = State::Sequence;
                } else {
                    self.commit_features();
                    self.state = State::SeekingHeader;
                }
            }
            LineKind::Terminator => self.close_record(),
            LineKind::Other => self.stats.malformed("line with unexpected indentation in feature table"),
        }
    }

    fn on_sequence(&mut self, line: &str) {
        match classify(line) {
            LineKind::Terminator => self.close_record(),
            LineKind::Keyword(keyword) if keyword.starts_with("LOCUS") => self.open_record(keyword),
            _ => {
                if let Some(record) = &mut self.record {
                    record.sequence.extend(
                        line.chars()
                            .filter(|c| !c.is_ascii_digit() && !c.is_whitespace())
                            .map(|c| c.to_ascii_uppercase()),
                    );
                }
            }
        }
    }
}

impl LineDecoder for GenbankDecoder {
    fn push_line(&mut self, line: &str) {
        self.stats.lines += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return;
        }

        match self.state {
            State::SeekingHeader => self.on_seeking_header(classify(line)),
            State::Features | State::Qualifier => self.on_feature_table(classify(line)),
            State::Sequence => self.on_sequence(line),
        }
    }

    fn finish(mut self: Box<Self>) -> Decoded {
        // A file may end without the closing `//`
        self.close_record();
        Decoded {
            sequences: self.sequences,
            annotations: self.annotations,
            stats: self.stats,
            ..Decoded::default()
        }
    }

    fn lines_seen(&self) -> u64 {
        self.stats.lines
    }
}

/// Decode GenBank text in one pass with default value limits
pub fn parse_genbank_text(text: &str) -> Decoded {
    crate::parsing::decode_text(Box::new(GenbankDecoder::default()), text)
}
