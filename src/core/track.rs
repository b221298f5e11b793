use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{ChromId, ZeroBasedSpan};

/// Declaration style a numeric track was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    FixedStep,
    VariableStep,
}

/// Display metadata carried by a `track` line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default)]
    pub auto_scale: bool,

    /// Any other `key=value` pair of the track line (`type`, `visibility`, `viewLimits`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One numeric bin of a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackInterval {
    pub span: ZeroBasedSpan,
    pub value: f64,
}

/// A named collection of per-chromosome numeric intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,

    pub declaration_kind: DeclarationKind,

    pub metadata: TrackMetadata,

    /// Intervals per chromosome, in the order they were produced
    pub per_chromosome: BTreeMap<ChromId, Vec<TrackInterval>>,
}

impl Track {
    pub fn new(name: impl Into<String>, declaration_kind: DeclarationKind) -> Self {
        Self {
            name: name.into(),
            declaration_kind,
            metadata: TrackMetadata::default(),
            per_chromosome: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, chromosome: &str, span: ZeroBasedSpan, value: f64) {
        self.per_chromosome
            .entry(chromosome.to_string())
            .or_default()
            .push(TrackInterval { span, value });
    }

    /// Total number of intervals across all chromosomes
    #[must_use]
    pub fn interval_count(&self) -> usize {
        self.per_chromosome.values().map(Vec::len).sum()
    }

    /// Intervals on `chromosome` overlapping `query`
    #[must_use]
    pub fn values_in(&self, chromosome: &str, query: &ZeroBasedSpan) -> Vec<TrackInterval> {
        self.per_chromosome
            .get(chromosome)
            .map(|intervals| {
                intervals
                    .iter()
                    .filter(|i| i.span.overlaps(query))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append every interval of `other` after the ones already present
    pub fn absorb(&mut self, other: Track) {
        for (chromosome, intervals) in other.per_chromosome {
            self.per_chromosome
                .entry(chromosome)
                .or_default()
                .extend(intervals);
        }
    }
}
