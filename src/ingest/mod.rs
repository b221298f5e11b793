//! The ingestion engine: detection, strategy selection, decoding, merging.
//!
//! ```text
//! path ─> FileIo ─> format_detection ─> strategy ─> decoder ─> merge ─> Dataset
//!                                                     ^
//!                                    streaming (chunks, progress, cancel)
//! ```
//!
//! [`coordinator::IngestCoordinator`] drives one load at a time and is the only
//! layer that reports a load as failed. Decoders swallow per-record problems and
//! count them; see [`crate::parsing::DecodeStats`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::alignment::AlignmentError;
use crate::config::IngestConfig;
use crate::parsing::bed::BedDecoder;
use crate::parsing::fasta::FastaDecoder;
use crate::parsing::genbank::GenbankDecoder;
use crate::parsing::gff::GffDecoder;
use crate::parsing::sam::SamDecoder;
use crate::parsing::vcf::VcfDecoder;
use crate::parsing::wig::{WigDecoder, DEFAULT_TRACK_NAME};
use crate::parsing::LineDecoder;

pub mod coordinator;
pub mod format_detection;
pub mod merge;
pub mod source;
pub mod strategy;
pub mod streaming;

use coordinator::{DisplaySignal, IngestState};
use format_detection::{
    supported_extensions_list, AlignmentEncoding, FileFormat, IntervalFamily,
};
use source::Progress;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file format '{extension}'. Supported extensions: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    #[error("Failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("{path} ({size} bytes) is too large to read into memory and streaming it failed: {reason}")]
    SizeExceedsMemory {
        path: PathBuf,
        size: u64,
        reason: String,
    },

    #[error("Alignment error: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Load of {0} was cancelled")]
    Cancelled(PathBuf),

    #[error("Invalid ingestion state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl IngestError {
    /// `UnsupportedFormat` for a detection extension (empty when the name has none)
    #[must_use]
    pub fn unsupported(extension: &str) -> Self {
        let extension = if extension.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{extension}")
        };
        Self::UnsupportedFormat {
            extension,
            supported: supported_extensions_list(),
        }
    }

    pub(crate) fn io(path: &Path, reason: impl ToString) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Cooperative cancellation of a load, checked between chunks
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Notifications published while a load runs
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// The coordinator entered a new state
    State(IngestState),
    /// Read or decode progress of the current load
    Progress(Progress),
    /// A streamed chunk was decoded
    Chunk { index: usize, lines: usize },
    /// The load finished and its data is resident
    Loaded(DisplaySignal),
}

/// Optional event channel; sending never blocks and never fails the load
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<mpsc::UnboundedSender<IngestEvent>>);

impl EventSink {
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<IngestEvent>) -> Self {
        Self(Some(sender))
    }

    /// A sink that drops every event
    #[must_use]
    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn emit(&self, event: IngestEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(event);
        }
    }
}

/// A fresh line decoder for a text format; `None` for binary alignments.
///
/// `default_track_name` names wiggle tracks that declare no `name=`.
#[must_use]
pub fn decoder_for(
    format: FileFormat,
    config: &IngestConfig,
    default_track_name: &str,
) -> Option<Box<dyn LineDecoder>> {
    let decoder: Box<dyn LineDecoder> = match format {
        FileFormat::Sequence => Box::new(FastaDecoder::new()),
        FileFormat::AnnotatedRecord => Box::new(GenbankDecoder::new(
            config.max_qualifier_bytes,
            config.translation_preview_chars,
        )),
        FileFormat::IntervalAnnotation(IntervalFamily::GffLike) => Box::new(GffDecoder::new()),
        FileFormat::IntervalAnnotation(IntervalFamily::BedLike) => Box::new(BedDecoder::new()),
        FileFormat::Variant => Box::new(VcfDecoder::new()),
        FileFormat::Alignment(AlignmentEncoding::Text) => {
            Box::new(SamDecoder::new(config.max_reads_per_reference))
        }
        FileFormat::Alignment(AlignmentEncoding::Binary) => return None,
        FileFormat::NumericTrack => Box::new(WigDecoder::new(if default_track_name.is_empty() {
            DEFAULT_TRACK_NAME
        } else {
            default_track_name
        })),
    };
    Some(decoder)
}

/// File stem used as the fallback track name (`signal.wig.gz` -> `signal`)
#[must_use]
pub fn track_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut stem = name.as_str();
    if format_detection::is_compressed_name(path) {
        stem = stem.rsplit_once('.').map_or(stem, |(rest, _)| rest);
    }
    stem.rsplit_once('.')
        .map_or(stem, |(rest, _)| rest)
        .to_string()
}
