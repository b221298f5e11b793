//! The ingestion coordinator.
//!
//! ```text
//!  Idle ─> Detecting ─> StrategySelecting ─> Decoding ─> Merging ─> Idle(Success)
//!                            ^                  │
//!                            └── at most once ──┘  (whole read needs streaming)
//!
//!  any state ──────────────────────────────────────────────> Idle(Failed)
//! ```
//!
//! Loads are serialized: a FIFO async lock is held for a whole load, so a second
//! load waits until the first has merged. The dataset sits behind its own lock,
//! taken only while merging, so readers see either the state before a load or
//! the state after it.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::alignment::bam::NoodlesBamOpener;
use crate::alignment::BinaryAlignmentOpener;
use crate::config::IngestConfig;
use crate::core::dataset::{Dataset, LoadedFile};
use crate::ingest::format_detection::{AlignmentEncoding, DisplayCategory, FileFormat};
use crate::ingest::merge::{merge_into, MergeSummary};
use crate::ingest::source::{FileIo, FileReadError, LocalFileIo};
use crate::ingest::strategy::{select_strategy, IngestionRequest, Strategy};
use crate::ingest::streaming::{decode_stream, decode_whole, open_binary_alignment};
use crate::ingest::{decoder_for, track_stem, CancelFlag, EventSink, IngestError, IngestEvent};
use crate::parsing::{DecodeStats, Decoded};

/// How the last load ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum Completion {
    Success,
    Failed(String),
}

/// Coordinator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum IngestState {
    /// No load running; carries the outcome of the previous one
    Idle(Option<Completion>),
    Detecting,
    StrategySelecting,
    Decoding(Strategy),
    Merging,
}

impl Default for IngestState {
    fn default() -> Self {
        Self::Idle(None)
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle(None) => write!(f, "idle"),
            Self::Idle(Some(Completion::Success)) => write!(f, "idle (success)"),
            Self::Idle(Some(Completion::Failed(reason))) => write!(f, "idle (failed: {reason})"),
            Self::Detecting => write!(f, "detecting"),
            Self::StrategySelecting => write!(f, "selecting strategy"),
            Self::Decoding(strategy) => write!(f, "decoding ({strategy})"),
            Self::Merging => write!(f, "merging"),
        }
    }
}

impl IngestState {
    /// Whether `next` may follow `self`
    #[must_use]
    pub fn can_transition_to(&self, next: &IngestState) -> bool {
        use IngestState::{Decoding, Detecting, Idle, Merging, StrategySelecting};

        match (self, next) {
            (_, Idle(Some(Completion::Failed(_)))) => true,
            (Idle(_), Detecting) => true,
            (Detecting, StrategySelecting) => true,
            (StrategySelecting, Decoding(_)) => true,
            // Escalation from a whole read to a streamed one
            (Decoding(Strategy::Whole), StrategySelecting) => true,
            (Decoding(_), Merging) => true,
            (Merging, Idle(Some(Completion::Success))) => true,
            _ => false,
        }
    }
}

/// What the display layer should do after a load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplaySignal {
    pub format: FileFormat,
    /// Layers to enable, derived from the format alone
    pub categories: Vec<DisplayCategory>,
    /// True only if a sequence was already resident before this load
    pub refresh_needed: bool,
}

/// Result of a successful load
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub request: IngestionRequest,
    /// Whether a whole read was escalated to a streamed one
    pub escalated: bool,
    pub stats: DecodeStats,
    pub merge: MergeSummary,
    pub signal: DisplaySignal,
}

/// Drives loads into one shared dataset
pub struct IngestCoordinator<F: FileIo> {
    io: F,
    opener: Arc<dyn BinaryAlignmentOpener>,
    config: IngestConfig,
    dataset: Arc<Mutex<Dataset>>,
    load_lock: Mutex<()>,
    state: std::sync::Mutex<IngestState>,
    events: EventSink,
}

impl IngestCoordinator<LocalFileIo> {
    /// Coordinator over the local filesystem with the `noodles` BAM provider
    #[must_use]
    pub fn local(config: IngestConfig) -> Self {
        let io = LocalFileIo::new(&config);
        let opener = Arc::new(NoodlesBamOpener::new(config.max_reads_per_reference));
        Self::new(io, opener, config)
    }
}

impl<F: FileIo> IngestCoordinator<F> {
    pub fn new(io: F, opener: Arc<dyn BinaryAlignmentOpener>, config: IngestConfig) -> Self {
        Self {
            io,
            opener,
            config,
            dataset: Arc::new(Mutex::new(Dataset::new())),
            load_lock: Mutex::new(()),
            state: std::sync::Mutex::new(IngestState::default()),
            events: EventSink::disabled(),
        }
    }

    /// Publish events of every subsequent load on `sender`
    #[must_use]
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<IngestEvent>) -> Self {
        self.events = EventSink::new(sender);
        self
    }

    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Shared handle on the resident dataset
    #[must_use]
    pub fn dataset(&self) -> Arc<Mutex<Dataset>> {
        Arc::clone(&self.dataset)
    }

    /// Current coordinator state
    #[must_use]
    pub fn state(&self) -> IngestState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn transition(&self, next: IngestState) -> Result<(), IngestError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(&next) {
            return Err(IngestError::InvalidTransition {
                from: state.to_string(),
                to: next.to_string(),
            });
        }
        let from = state.to_string();
        debug!(from = %from, to = %next, "Ingestion state change");
        *state = next.clone();
        drop(state);
        self.events.emit(IngestEvent::State(next));
        Ok(())
    }

    /// Load one file into the dataset
    ///
    /// # Errors
    ///
    /// Returns `IngestError::UnsupportedFormat` for unknown extensions,
    /// `IngestError::Io` if the file cannot be read, `IngestError::SizeExceedsMemory`
    /// if a file too large for memory also fails to stream, or
    /// `IngestError::Alignment` if a binary alignment cannot be opened.
    pub async fn load(&self, path: &Path) -> Result<IngestOutcome, IngestError> {
        self.load_with_cancel(path, &CancelFlag::new()).await
    }

    /// Load one file, giving up between chunks once `cancel` is raised
    ///
    /// A cancelled load leaves the dataset untouched.
    ///
    /// # Errors
    ///
    /// As [`Self::load`], plus `IngestError::Cancelled`.
    pub async fn load_with_cancel(
        &self,
        path: &Path,
        cancel: &CancelFlag,
    ) -> Result<IngestOutcome, IngestError> {
        let _serialized = self.load_lock.lock().await;

        match self.run_load(path, cancel).await {
            Ok(outcome) => {
                self.transition(IngestState::Idle(Some(Completion::Success)))?;
                self.events.emit(IngestEvent::Loaded(outcome.signal.clone()));
                Ok(outcome)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Load failed");
                self.transition(IngestState::Idle(Some(Completion::Failed(e.to_string()))))?;
                Err(e)
            }
        }
    }

    async fn run_load(
        &self,
        path: &Path,
        cancel: &CancelFlag,
    ) -> Result<IngestOutcome, IngestError> {
        self.transition(IngestState::Detecting)?;
        let info = self
            .io
            .file_info(path)
            .await
            .map_err(|e| IngestError::io(path, e))?;
        let format = FileFormat::from_extension(&info.extension)
            .ok_or_else(|| IngestError::unsupported(&info.extension))?;

        self.transition(IngestState::StrategySelecting)?;
        let strategy = select_strategy(format, info.size, &self.config);
        let mut request = IngestionRequest {
            path: path.to_path_buf(),
            format,
            size_bytes: info.size,
            strategy,
        };
        info!(
            path = %path.display(),
            format = %format,
            size = info.size,
            strategy = %strategy,
            "Loading file"
        );

        self.transition(IngestState::Decoding(strategy))?;
        let mut escalated = false;
        let (decoded, binary) = if format == FileFormat::Alignment(AlignmentEncoding::Binary) {
            let index = open_binary_alignment(Arc::clone(&self.opener), path).await?;
            (Decoded::default(), Some(index))
        } else {
            let decoded = match strategy {
                Strategy::Streamed => self.decode_streamed(path, format, cancel).await?,
                Strategy::Whole => match self.io.read_file(path).await {
                    Ok(text) => {
                        let decoder = self.decoder(path, format)?;
                        decode_whole(path, &text, decoder, &self.config, cancel, &self.events)
                            .await?
                    }
                    Err(FileReadError::RequiresStreaming { size, limit }) => {
                        info!(
                            path = %path.display(),
                            size,
                            limit,
                            "File too large for a whole read; streaming instead"
                        );
                        escalated = true;
                        request.strategy = Strategy::Streamed;
                        self.transition(IngestState::StrategySelecting)?;
                        self.transition(IngestState::Decoding(Strategy::Streamed))?;
                        self.decode_streamed(path, format, cancel)
                            .await
                            .map_err(|e| match e {
                                IngestError::Cancelled(_) => e,
                                other => IngestError::SizeExceedsMemory {
                                    path: path.to_path_buf(),
                                    size,
                                    reason: other.to_string(),
                                },
                            })?
                    }
                    Err(e) => return Err(IngestError::io(path, e)),
                },
            };
            (decoded, None)
        };

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled(path.to_path_buf()));
        }

        self.transition(IngestState::Merging)?;
        let stats = decoded.stats.clone();
        let ledger_entry = LoadedFile {
            name: info.name.clone(),
            kind: format.display_name().to_string(),
            size: info.size,
            path: path.to_path_buf(),
            loaded_at: Utc::now(),
        };

        let (merge, refresh_needed) = {
            let mut dataset = self.dataset.lock().await;
            let had_sequence = dataset.has_sequence();
            let summary = merge_into(&mut dataset, decoded, binary, ledger_entry);
            (summary, had_sequence)
        };

        info!(
            file = %info.name,
            records = stats.records,
            malformed = stats.malformed,
            dropped = stats.dropped,
            "Loaded file"
        );

        Ok(IngestOutcome {
            request,
            escalated,
            stats,
            merge,
            signal: DisplaySignal {
                format,
                categories: format.display_categories().to_vec(),
                refresh_needed,
            },
        })
    }

    fn decoder(
        &self,
        path: &Path,
        format: FileFormat,
    ) -> Result<Box<dyn crate::parsing::LineDecoder>, IngestError> {
        decoder_for(format, &self.config, &track_stem(path))
            .ok_or_else(|| IngestError::io(path, "binary content has no line decoder"))
    }

    async fn decode_streamed(
        &self,
        path: &Path,
        format: FileFormat,
        cancel: &CancelFlag,
    ) -> Result<Decoded, IngestError> {
        let decoder = self.decoder(path, format)?;
        let stream = self
            .io
            .read_file_stream(path)
            .await
            .map_err(|e| IngestError::io(path, e))?;
        decode_stream(path, stream, decoder, cancel, &self.events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let idle = IngestState::default();
        assert!(idle.can_transition_to(&IngestState::Detecting));
        assert!(!idle.can_transition_to(&IngestState::Merging));

        assert!(IngestState::Decoding(Strategy::Whole).can_transition_to(&IngestState::StrategySelecting));
        assert!(!IngestState::Decoding(Strategy::Streamed)
            .can_transition_to(&IngestState::StrategySelecting));

        let failed = IngestState::Idle(Some(Completion::Failed("x".to_string())));
        assert!(IngestState::Merging.can_transition_to(&failed));
        assert!(IngestState::Detecting.can_transition_to(&failed));
        assert!(!IngestState::Detecting
            .can_transition_to(&IngestState::Idle(Some(Completion::Success))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(IngestState::Decoding(Strategy::Streamed).to_string(), "decoding (streamed)");
        assert_eq!(
            IngestState::Idle(Some(Completion::Failed("boom".to_string()))).to_string(),
            "idle (failed: boom)"
        );
    }
}
