//! File access for the ingestion engine.
//!
//! [`FileIo`] is the narrow file service the coordinator talks to: metadata,
//! whole-file reads, and streamed reads. [`LocalFileIo`] implements it over the
//! local filesystem.
//!
//! ## Streamed reads
//!
//! A streamed read runs on a blocking worker and publishes [`StreamEvent`]s into
//! a bounded channel. The returned [`FileStream`] owns the receiving end, so the
//! subscription exists before the first byte is read, and dropping the stream
//! (after completion, on error or on cancellation) is the deregistration: the
//! worker stops at its next send.
//!
//! Event order for a successful read:
//!
//! ```text
//! Lines, [Progress], Lines, [Progress], ..., Progress(100), Complete
//! ```
//!
//! Intermediate progress is emitted only when the integer percentage has
//! advanced by at least `progress_step_percent`, and stays below 100 until the
//! final event.

use flate2::read::MultiGzDecoder;
use std::future::Future;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::IngestConfig;
use crate::ingest::format_detection::effective_extension;

/// Leading bytes of a gzip (and BGZF) stream
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Leading bytes of decompressed BAM content
pub const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// Events buffered between the reading worker and the consumer
const STREAM_CHANNEL_CAPACITY: usize = 4;

#[derive(Error, Debug)]
pub enum FileReadError {
    #[error("File is {size} bytes, above the {limit} byte limit for whole-file reads; it must be streamed")]
    RequiresStreaming { size: u64, limit: u64 },

    #[error("File holds binary alignment data and cannot be read as text")]
    BinaryAlignment,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Metadata of a file about to be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    /// File name without directories
    pub name: String,
    /// Detection extension (see [`effective_extension`])
    pub extension: String,
    pub size: u64,
}

/// Read progress, measured on bytes taken from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub bytes_read: u64,
    pub bytes_total: u64,
}

/// One event of a streamed read
#[derive(Debug)]
pub enum StreamEvent {
    /// Read progress
    Progress(Progress),
    /// The next batch of lines, without terminators
    Lines(Vec<String>),
    /// The read finished; `lines` is the total line count
    Complete { lines: u64 },
    /// The read failed; no further events follow
    Failed(io::Error),
}

/// Receiving end of a streamed read. Dropping it stops the reader.
#[derive(Debug)]
pub struct FileStream {
    receiver: mpsc::Receiver<StreamEvent>,
}

impl FileStream {
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` once the reader is gone
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }
}

/// The file service consumed by the ingestion coordinator
pub trait FileIo: Send + Sync {
    /// Size, name and detection extension of `path`
    fn file_info(&self, path: &Path)
        -> impl Future<Output = Result<FileInfo, FileReadError>> + Send;

    /// Whole content of `path` as text
    ///
    /// Fails with `RequiresStreaming` when the content would exceed the
    /// service's in-memory maximum and with `BinaryAlignment` for BAM content.
    fn read_file(&self, path: &Path) -> impl Future<Output = Result<String, FileReadError>> + Send;

    /// Start a streamed read of `path`
    fn read_file_stream(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<FileStream, FileReadError>> + Send;
}

/// `FileIo` over the local filesystem, with transparent gzip decompression
#[derive(Debug, Clone)]
pub struct LocalFileIo {
    max_whole_read_bytes: u64,
    chunk_lines: usize,
    progress_step_percent: u8,
}

impl Default for LocalFileIo {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

impl LocalFileIo {
    #[must_use]
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            max_whole_read_bytes: config.max_whole_read_bytes,
            chunk_lines: config.chunk_lines.max(1),
            progress_step_percent: config.progress_step_percent.clamp(1, 100),
        }
    }
}

/// Byte counter shared between the reading worker and its progress reports
#[derive(Debug)]
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

type TextReader = Box<dyn BufRead + Send>;

/// Open `path`, decompressing gzip content, and reject BAM content
fn open_text_reader(path: &Path) -> Result<(TextReader, Arc<AtomicU64>), FileReadError> {
    let count = Arc::new(AtomicU64::new(0));
    let file = std::fs::File::open(path)?;
    let mut raw = BufReader::new(CountingReader {
        inner: file,
        count: Arc::clone(&count),
    });

    let is_gzip = raw.fill_buf()?.starts_with(&GZIP_MAGIC);
    let mut reader: TextReader = if is_gzip {
        Box::new(BufReader::new(MultiGzDecoder::new(raw)))
    } else {
        Box::new(raw)
    };

    if reader.fill_buf()?.starts_with(BAM_MAGIC) {
        return Err(FileReadError::BinaryAlignment);
    }
    Ok((reader, count))
}

fn percent_of(bytes_read: u64, bytes_total: u64) -> u8 {
    if bytes_total == 0 {
        return 0;
    }
    ((bytes_read.min(bytes_total) * 100) / bytes_total) as u8
}

/// Body of the streaming worker; returns the number of lines read
fn produce_events(
    mut reader: TextReader,
    count: &AtomicU64,
    bytes_total: u64,
    chunk_lines: usize,
    progress_step: u8,
    sender: &mpsc::Sender<StreamEvent>,
) -> u64 {
    let mut chunk = Vec::with_capacity(chunk_lines);
    let mut buf = Vec::new();
    let mut lines: u64 = 0;
    let mut last_percent: u8 = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                chunk.push(String::from_utf8_lossy(&buf).into_owned());
                lines += 1;
            }
            Err(e) => {
                let _ = sender.blocking_send(StreamEvent::Failed(e));
                return lines;
            }
        }

        if chunk.len() >= chunk_lines {
            let batch = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_lines));
            if sender.blocking_send(StreamEvent::Lines(batch)).is_err() {
                debug!(lines, "Stream receiver dropped; stopping reader");
                return lines;
            }

            let bytes_read = count.load(Ordering::Relaxed);
            let percent = percent_of(bytes_read, bytes_total).min(99);
            if percent >= last_percent.saturating_add(progress_step) {
                last_percent = percent;
                let progress = Progress {
                    percent,
                    bytes_read,
                    bytes_total,
                };
                if sender.blocking_send(StreamEvent::Progress(progress)).is_err() {
                    return lines;
                }
            }
        }
    }

    if !chunk.is_empty() && sender.blocking_send(StreamEvent::Lines(chunk)).is_err() {
        return lines;
    }
    let done = Progress {
        percent: 100,
        bytes_read: bytes_total,
        bytes_total,
    };
    if sender.blocking_send(StreamEvent::Progress(done)).is_err() {
        return lines;
    }
    let _ = sender.blocking_send(StreamEvent::Complete { lines });
    lines
}

fn join_error(e: tokio::task::JoinError) -> FileReadError {
    FileReadError::Io(io::Error::other(e))
}

impl FileIo for LocalFileIo {
    async fn file_info(&self, path: &Path) -> Result<FileInfo, FileReadError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(FileReadError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )));
        }

        Ok(FileInfo {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: effective_extension(path),
            size: metadata.len(),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<String, FileReadError> {
        let size = tokio::fs::metadata(path).await?.len();
        let limit = self.max_whole_read_bytes;
        if size > limit {
            return Err(FileReadError::RequiresStreaming { size, limit });
        }

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let (reader, _) = open_text_reader(&path)?;
            // Decompressed content can outgrow the on-disk size
            let mut bytes = Vec::new();
            reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
            if bytes.len() as u64 > limit {
                return Err(FileReadError::RequiresStreaming {
                    size: bytes.len() as u64,
                    limit,
                });
            }
            // Decoded the same way as streamed lines
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
        .await
        .map_err(join_error)?
    }

    async fn read_file_stream(&self, path: &Path) -> Result<FileStream, FileReadError> {
        let (stream, _worker) = self.spawn_stream(path).await?;
        Ok(stream)
    }
}

impl LocalFileIo {
    /// Start the reading worker; its handle resolves to the number of lines read
    async fn spawn_stream(
        &self,
        path: &Path,
    ) -> Result<(FileStream, JoinHandle<u64>), FileReadError> {
        let bytes_total = tokio::fs::metadata(path).await?.len();
        let owned = path.to_path_buf();
        let (reader, count) = tokio::task::spawn_blocking(move || open_text_reader(&owned))
            .await
            .map_err(join_error)??;

        let (sender, receiver) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let chunk_lines = self.chunk_lines;
        let progress_step = self.progress_step_percent;
        debug!(path = %path.display(), bytes_total, chunk_lines, "Starting streamed read");

        let worker = tokio::task::spawn_blocking(move || {
            produce_events(reader, &count, bytes_total, chunk_lines, progress_step, &sender)
        });

        Ok((FileStream::new(receiver), worker))
    }
}
