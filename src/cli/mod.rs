//! Command-line interface for genome-ingest.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **load**: Ingest one or more files in order and summarize the dataset
//! - **formats**: List supported file extensions
//!
//! ## Usage
//!
//! ```text
//! # Load a reference and its annotation
//! genome-ingest load genome.fa genes.gff3
//!
//! # Query a region after loading
//! genome-ingest load genome.gbk calls.vcf.gz --region NC_000913:190-2799
//!
//! # Stream alignments above 10 MB and print progress
//! genome-ingest load reads.sam --streaming-threshold-mb 10 --progress
//!
//! # JSON output for scripting
//! genome-ingest load genes.bed --format json
//! ```

use clap::{Parser, Subcommand};

pub mod formats;
pub mod load;

#[derive(Parser)]
#[command(name = "genome-ingest")]
#[command(version)]
#[command(about = "Load genomic files into a normalized in-memory dataset")]
#[command(
    long_about = "genome-ingest reads sequence, annotation, variant, alignment and numeric track files.\n\nFiles are decoded into one dataset with consistent coordinates:\n- Features are 1-based inclusive\n- Variants, reads and track bins are 0-based half-open\n- Large text alignments are streamed in chunks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load files into a dataset and print a summary
    Load(load::LoadArgs),

    /// List supported file extensions
    Formats,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
