//! Decoding drivers for the two strategies, plus the binary alignment bridge.
//!
//! - [`decode_whole`]: decode an in-memory text; large inputs yield to the
//!   runtime every ~1% of lines and report progress
//! - [`decode_stream`]: feed a [`FileStream`] chunk by chunk into a decoder,
//!   checking the cancel flag between chunks
//! - [`open_binary_alignment`]: open a binary alignment on a blocking worker

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::alignment::{AlignmentIndex, BinaryAlignmentOpener};
use crate::config::IngestConfig;
use crate::ingest::source::{FileStream, Progress, StreamEvent};
use crate::ingest::{CancelFlag, EventSink, IngestError, IngestEvent};
use crate::parsing::{Decoded, LineDecoder};

/// Decode a whole text buffer.
///
/// Inputs above `large_file_line_threshold` lines yield every ~1% of lines so
/// other tasks keep running, and emit progress when the percentage advances.
/// Every decode ends with one `100` progress event.
///
/// # Errors
///
/// Returns `IngestError::Cancelled` if `cancel` is raised while yielding.
pub async fn decode_whole(
    path: &Path,
    text: &str,
    mut decoder: Box<dyn LineDecoder>,
    config: &IngestConfig,
    cancel: &CancelFlag,
    events: &EventSink,
) -> Result<Decoded, IngestError> {
    let total_lines = text.lines().count();
    let bytes_total = text.len() as u64;
    let done = Progress {
        percent: 100,
        bytes_read: bytes_total,
        bytes_total,
    };
    if total_lines <= config.large_file_line_threshold {
        for line in text.lines() {
            decoder.push_line(line);
        }
        events.emit(IngestEvent::Progress(done));
        return Ok(decoder.finish());
    }

    let yield_every = (total_lines / 100).max(1);
    let step = config.progress_step_percent.max(1);
    let mut last_percent = 0u8;
    let mut bytes_read = 0u64;
    debug!(path = %path.display(), total_lines, yield_every, "Decoding large file in slices");

    for (i, line) in text.lines().enumerate() {
        decoder.push_line(line);
        bytes_read += line.len() as u64 + 1;

        if (i + 1) % yield_every == 0 {
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled(path.to_path_buf()));
            }
            let percent = (((i + 1) * 100) / total_lines).min(99) as u8;
            if percent >= last_percent.saturating_add(step) {
                last_percent = percent;
                events.emit(IngestEvent::Progress(Progress {
                    percent,
                    bytes_read: bytes_read.min(bytes_total),
                    bytes_total,
                }));
            }
        }
    }

    events.emit(IngestEvent::Progress(done));
    Ok(decoder.finish())
}

/// Consume a streamed read into `decoder`.
///
/// The stream is dropped on every exit path, which stops the reading worker.
///
/// # Errors
///
/// Returns `IngestError::Cancelled` if `cancel` is raised between chunks, or
/// `IngestError::Io` if the read fails or ends without completing.
pub async fn decode_stream(
    path: &Path,
    mut stream: FileStream,
    mut decoder: Box<dyn LineDecoder>,
    cancel: &CancelFlag,
    events: &EventSink,
) -> Result<Decoded, IngestError> {
    let mut chunks = 0usize;

    loop {
        let Some(event) = stream.next_event().await else {
            return Err(IngestError::io(path, "stream ended before completion"));
        };

        match event {
            StreamEvent::Lines(lines) => {
                for line in &lines {
                    decoder.push_line(line);
                }
                events.emit(IngestEvent::Chunk {
                    index: chunks,
                    lines: lines.len(),
                });
                chunks += 1;

                if cancel.is_cancelled() {
                    info!(path = %path.display(), chunks, "Streamed load cancelled");
                    return Err(IngestError::Cancelled(path.to_path_buf()));
                }
            }
            StreamEvent::Progress(progress) => events.emit(IngestEvent::Progress(progress)),
            StreamEvent::Complete { lines } => {
                debug!(path = %path.display(), lines, chunks, "Streamed read complete");
                break;
            }
            StreamEvent::Failed(e) => return Err(IngestError::io(path, e)),
        }
    }

    Ok(decoder.finish())
}

/// Open a binary alignment through `opener` without blocking the runtime
///
/// # Errors
///
/// Returns `IngestError::Alignment` if the file cannot be opened.
pub async fn open_binary_alignment(
    opener: Arc<dyn BinaryAlignmentOpener>,
    path: &Path,
) -> Result<Box<dyn AlignmentIndex>, IngestError> {
    let owned = path.to_path_buf();
    let index = tokio::task::spawn_blocking(move || opener.open(&owned))
        .await
        .map_err(|e| IngestError::io(path, e))??;
    Ok(index)
}
