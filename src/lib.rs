//! # genome-ingest
//!
//! A streaming, multi-format engine that turns genomic files into one
//! normalized in-memory dataset.
//!
//! Sequence, annotation, variant, alignment and numeric track files all use
//! different grammars and coordinate conventions. `genome-ingest` decodes each
//! of them line by line, converts coordinates into one model per entity type,
//! and merges successive loads into a single [`Dataset`], streaming files that
//! are too large to hold in memory at once.
//!
//! ## Features
//!
//! - **Format detection**: by extension, with transparent gzip support
//! - **Line-driven decoders**: FASTA, GenBank, GFF/GTF, BED, VCF, SAM, wiggle
//! - **Streaming**: chunked reads with bounded-frequency progress and cancellation
//! - **Merge policy**: replace sequences, append annotations, rename clashing tracks
//! - **On-demand BAM**: reads fetched by region through a narrow provider trait
//!
//! ## Example
//!
//! ```rust,no_run
//! use genome_ingest::{IngestConfig, IngestCoordinator, ZeroBasedSpan};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = IngestCoordinator::local(IngestConfig::default());
//! coordinator.load(Path::new("genome.gbk")).await?;
//! coordinator.load(Path::new("calls.vcf.gz")).await?;
//!
//! let dataset = coordinator.dataset();
//! let dataset = dataset.lock().await;
//! for variant in dataset.variants_in("NC_000913", &ZeroBasedSpan::new(0, 10_000)) {
//!     println!("{} {}>{}", variant.start(), variant.reference, variant.alternate);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Dataset and entity types with distinct coordinate spans
//! - [`parsing`]: Per-format line decoders
//! - [`ingest`]: Detection, strategy selection, streaming, merging and coordination
//! - [`alignment`]: In-memory and on-demand alignment providers
//! - [`config`]: Ingestion settings
//! - [`cli`]: Command-line interface implementation

pub mod alignment;
pub mod cli;
pub mod config;
pub mod core;
pub mod ingest;
pub mod parsing;

// Re-export commonly used types for convenience
pub use config::IngestConfig;
pub use core::dataset::{Dataset, LoadedFile};
pub use core::feature::{Feature, QualifierValue, Qualifiers};
pub use core::read::Read;
pub use core::track::Track;
pub use core::types::*;
pub use core::variant::Variant;
pub use ingest::coordinator::{IngestCoordinator, IngestOutcome};
pub use ingest::format_detection::FileFormat;
pub use ingest::{CancelFlag, IngestError, IngestEvent};
