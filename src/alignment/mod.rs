//! Alignment providers.
//!
//! A dataset holds at most one alignment provider at a time:
//!
//! - [`AlignmentSource::InMemory`]: reads decoded from SAM text, grouped by reference
//! - [`AlignmentSource::OnDemand`]: a handle on a binary alignment file that
//!   fetches reads by region when asked
//!
//! The binary decoder sits behind two narrow traits, [`BinaryAlignmentOpener`]
//! and [`AlignmentIndex`], so the ingestion engine never depends on its byte
//! layout. [`bam::NoodlesBamOpener`] is the shipped implementation.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::read::Read;
use crate::core::types::{ChromId, ZeroBasedSpan};

pub mod bam;

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid alignment file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("Unknown reference: {0}")]
    UnknownReference(String),
}

/// A reference sequence declared by an alignment header
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReferenceInfo {
    pub name: String,
    pub length: u64,
}

/// An opened binary alignment file
pub trait AlignmentIndex: Send + Sync + Debug {
    /// Whether a companion index was found next to the file
    fn has_index(&self) -> bool;

    /// References in header order
    fn references(&self) -> &[ReferenceInfo];

    /// Reads on `chromosome` overlapping the 0-based half-open `region`
    ///
    /// # Errors
    ///
    /// Returns `AlignmentError::UnknownReference` if `chromosome` is not in the
    /// header, or `AlignmentError::Io` if the file cannot be read.
    fn fetch_reads(&self, chromosome: &str, region: ZeroBasedSpan)
        -> Result<Vec<Read>, AlignmentError>;
}

/// Opens binary alignment files by path
pub trait BinaryAlignmentOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns `AlignmentError` if the file cannot be opened or its header is invalid.
    fn open(&self, path: &Path) -> Result<Box<dyn AlignmentIndex>, AlignmentError>;
}

/// The alignment provider resident in a dataset
#[derive(Debug)]
pub enum AlignmentSource {
    InMemory(BTreeMap<ChromId, Vec<Read>>),
    OnDemand(Box<dyn AlignmentIndex>),
}

impl AlignmentSource {
    /// Reads on `chromosome` overlapping `region`
    ///
    /// # Errors
    ///
    /// Returns `AlignmentError` from the on-demand provider.
    pub fn fetch_reads(
        &self,
        chromosome: &str,
        region: ZeroBasedSpan,
    ) -> Result<Vec<Read>, AlignmentError> {
        match self {
            Self::InMemory(reads) => Ok(reads
                .get(chromosome)
                .map(|reads| {
                    reads
                        .iter()
                        .filter(|r| r.span.overlaps(&region))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()),
            Self::OnDemand(index) => index.fetch_reads(chromosome, region),
        }
    }

    /// One-line human description
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::InMemory(reads) => {
                let total: usize = reads.values().map(Vec::len).sum();
                format!("in-memory: {total} reads on {} references", reads.len())
            }
            Self::OnDemand(index) => format!(
                "on-demand: {} references, {}",
                index.references().len(),
                if index.has_index() { "indexed" } else { "unindexed" }
            ),
        }
    }
}
