use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::alignment::{AlignmentError, AlignmentSource};
use crate::core::feature::Feature;
use crate::core::read::Read;
use crate::core::track::Track;
use crate::core::types::{ChromId, ZeroBasedSpan};
use crate::core::variant::Variant;

/// Ledger entry recorded for every successful load
#[derive(Debug, Clone, Serialize)]
pub struct LoadedFile {
    pub name: String,
    /// Display label of the detected format
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
}

/// The resident, query-ready data of one open session.
///
/// Only [`crate::ingest::merge`] mutates a dataset; everything else reads it.
#[derive(Debug, Default)]
pub struct Dataset {
    pub(crate) sequences: BTreeMap<ChromId, String>,
    pub(crate) annotations: BTreeMap<ChromId, Vec<Feature>>,
    pub(crate) variants: BTreeMap<ChromId, Vec<Variant>>,
    pub(crate) tracks: BTreeMap<String, Track>,
    pub(crate) alignment: Option<AlignmentSource>,
    pub(crate) loaded_files: Vec<LoadedFile>,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sequences(&self) -> &BTreeMap<ChromId, String> {
        &self.sequences
    }

    #[must_use]
    pub fn sequence(&self, chromosome: &str) -> Option<&str> {
        self.sequences.get(chromosome).map(String::as_str)
    }

    #[must_use]
    pub fn has_sequence(&self) -> bool {
        !self.sequences.is_empty()
    }

    #[must_use]
    pub fn annotations(&self) -> &BTreeMap<ChromId, Vec<Feature>> {
        &self.annotations
    }

    /// Features on `chromosome` in load order (empty if none)
    #[must_use]
    pub fn features(&self, chromosome: &str) -> &[Feature] {
        self.annotations.get(chromosome).map_or(&[], Vec::as_slice)
    }

    /// Features on `chromosome` overlapping the 0-based half-open `query`
    #[must_use]
    pub fn features_in(&self, chromosome: &str, query: &ZeroBasedSpan) -> Vec<&Feature> {
        self.features(chromosome)
            .iter()
            .filter(|f| f.span.overlaps(query))
            .collect()
    }

    #[must_use]
    pub fn variants(&self) -> &BTreeMap<ChromId, Vec<Variant>> {
        &self.variants
    }

    #[must_use]
    pub fn variants_on(&self, chromosome: &str) -> &[Variant] {
        self.variants.get(chromosome).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn variants_in(&self, chromosome: &str, query: &ZeroBasedSpan) -> Vec<&Variant> {
        self.variants_on(chromosome)
            .iter()
            .filter(|v| v.span.overlaps(query))
            .collect()
    }

    #[must_use]
    pub fn tracks(&self) -> &BTreeMap<String, Track> {
        &self.tracks
    }

    #[must_use]
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.get(name)
    }

    #[must_use]
    pub fn alignment(&self) -> Option<&AlignmentSource> {
        self.alignment.as_ref()
    }

    /// Reads overlapping `query`, from whichever alignment provider is resident
    ///
    /// # Errors
    ///
    /// Returns `AlignmentError` if the on-demand provider fails to read the region.
    pub fn fetch_reads(
        &self,
        chromosome: &str,
        query: ZeroBasedSpan,
    ) -> Result<Vec<Read>, AlignmentError> {
        match &self.alignment {
            Some(source) => source.fetch_reads(chromosome, query),
            None => Ok(Vec::new()),
        }
    }

    #[must_use]
    pub fn loaded_files(&self) -> &[LoadedFile] {
        &self.loaded_files
    }

    #[must_use]
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            sequences: self
                .sequences
                .iter()
                .map(|(name, seq)| (name.clone(), seq.len()))
                .collect(),
            features: self
                .annotations
                .iter()
                .map(|(name, features)| (name.clone(), features.len()))
                .collect(),
            variants: self
                .variants
                .iter()
                .map(|(name, variants)| (name.clone(), variants.len()))
                .collect(),
            tracks: self
                .tracks
                .values()
                .map(|t| (t.name.clone(), t.interval_count()))
                .collect(),
            alignment: self.alignment.as_ref().map(AlignmentSource::describe),
            loaded_files: self.loaded_files.clone(),
        }
    }
}

/// Serializable overview of a dataset (counts per key)
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    /// Sequence lengths by chromosome
    pub sequences: BTreeMap<ChromId, usize>,
    /// Feature counts by chromosome
    pub features: BTreeMap<ChromId, usize>,
    /// Variant counts by chromosome
    pub variants: BTreeMap<ChromId, usize>,
    /// Interval counts by track name
    pub tracks: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    pub loaded_files: Vec<LoadedFile>,
}
