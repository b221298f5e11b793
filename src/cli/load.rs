use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::OutputFormat;
use crate::config::IngestConfig;
use crate::core::dataset::{Dataset, DatasetSummary};
use crate::core::feature::Feature;
use crate::core::read::Read;
use crate::core::track::TrackInterval;
use crate::core::types::ZeroBasedSpan;
use crate::core::variant::Variant;
use crate::ingest::coordinator::{IngestCoordinator, IngestOutcome};
use crate::ingest::IngestEvent;
use crate::parsing::DecodeWarning;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Args)]
pub struct LoadArgs {
    /// Files to load, in order (FASTA, GenBank, GFF/GTF, BED, VCF, SAM, BAM, wiggle)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// JSON settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stream text alignments larger than this many megabytes
    #[arg(long)]
    pub streaming_threshold_mb: Option<u64>,

    /// Reads kept per reference for in-memory alignments
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_reads_per_reference: Option<u64>,

    /// Region to report after loading, as chrom:start-end (1-based, inclusive)
    #[arg(long)]
    pub region: Option<String>,

    /// Print load progress to stderr
    #[arg(long)]
    pub progress: bool,
}

/// A query region, stored 0-based half-open
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub chromosome: String,
    pub span: ZeroBasedSpan,
}

/// Parse `chrom:start-end` (1-based inclusive) or a bare `chrom`
///
/// # Errors
///
/// Returns an error if the coordinates are not positive integers or `end < start`.
pub fn parse_region(text: &str) -> anyhow::Result<Region> {
    let Some((chromosome, range)) = text.rsplit_once(':') else {
        return Ok(Region {
            chromosome: text.to_string(),
            span: ZeroBasedSpan::new(0, u64::MAX),
        });
    };

    let (start, end) = range
        .split_once('-')
        .with_context(|| format!("Region '{text}' must look like chrom:start-end"))?;
    let start: u64 = start
        .replace(',', "")
        .parse()
        .with_context(|| format!("Invalid region start in '{text}'"))?;
    let end: u64 = end
        .replace(',', "")
        .parse()
        .with_context(|| format!("Invalid region end in '{text}'"))?;
    if start == 0 || end < start {
        bail!("Region '{text}' must satisfy 1 <= start <= end");
    }

    Ok(Region {
        chromosome: chromosome.to_string(),
        span: ZeroBasedSpan::new(start - 1, end),
    })
}

fn build_config(args: &LoadArgs) -> anyhow::Result<IngestConfig> {
    let mut config = match &args.config {
        Some(path) => IngestConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => IngestConfig::default(),
    };
    if let Some(mb) = args.streaming_threshold_mb {
        config.streaming_threshold_bytes = mb.saturating_mul(BYTES_PER_MB);
    }
    if let Some(cap) = args.max_reads_per_reference {
        config.max_reads_per_reference = usize::try_from(cap).unwrap_or(usize::MAX);
    }
    config.validate()?;
    Ok(config)
}

#[derive(Serialize)]
struct FileReport {
    path: PathBuf,
    format: String,
    strategy: String,
    escalated: bool,
    records: u64,
    malformed: u64,
    dropped: u64,
    tracks: Vec<String>,
    warnings: Vec<DecodeWarning>,
}

impl From<&IngestOutcome> for FileReport {
    fn from(outcome: &IngestOutcome) -> Self {
        Self {
            path: outcome.request.path.clone(),
            format: outcome.request.format.display_name().to_string(),
            strategy: outcome.request.strategy.to_string(),
            escalated: outcome.escalated,
            records: outcome.stats.records,
            malformed: outcome.stats.malformed,
            dropped: outcome.stats.dropped,
            tracks: outcome.merge.tracks.clone(),
            warnings: outcome.stats.warnings.clone(),
        }
    }
}

#[derive(Serialize)]
struct RegionReport {
    region: Region,
    features: Vec<Feature>,
    variants: Vec<Variant>,
    reads: Vec<Read>,
    tracks: BTreeMap<String, Vec<TrackInterval>>,
}

fn query_region(dataset: &Dataset, region: Region) -> anyhow::Result<RegionReport> {
    let features = dataset
        .features_in(&region.chromosome, &region.span)
        .into_iter()
        .cloned()
        .collect();
    let variants = dataset
        .variants_in(&region.chromosome, &region.span)
        .into_iter()
        .cloned()
        .collect();
    let reads = dataset
        .fetch_reads(&region.chromosome, region.span)
        .with_context(|| format!("Failed to fetch reads for {}", region.chromosome))?;
    let tracks = dataset
        .tracks()
        .iter()
        .map(|(name, track)| (name.clone(), track.values_in(&region.chromosome, &region.span)))
        .filter(|(_, values)| !values.is_empty())
        .collect();

    Ok(RegionReport {
        region,
        features,
        variants,
        reads,
        tracks,
    })
}

#[derive(Serialize)]
struct LoadReport {
    files: Vec<FileReport>,
    dataset: DatasetSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<RegionReport>,
}

/// Print progress events to stderr until the sender side closes
async fn report_progress(mut events: mpsc::UnboundedReceiver<IngestEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            IngestEvent::State(state) => eprintln!("  [{state}]"),
            IngestEvent::Progress(progress) => eprintln!(
                "  {:>3}% ({} / {} bytes)",
                progress.percent, progress.bytes_read, progress.bytes_total
            ),
            IngestEvent::Chunk { .. } => {}
            IngestEvent::Loaded(signal) => {
                let categories: Vec<String> =
                    signal.categories.iter().map(ToString::to_string).collect();
                eprintln!(
                    "  loaded {}; enable: {}{}",
                    signal.format,
                    categories.join(", "),
                    if signal.refresh_needed { " (refresh)" } else { "" }
                );
            }
        }
    }
}

/// Run the `load` command
///
/// # Errors
///
/// Returns an error if the config is invalid, any file fails to load, or the
/// region query fails.
pub fn run(args: LoadArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let region = args.region.as_deref().map(parse_region).transpose()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let mut coordinator = IngestCoordinator::local(config);
        let progress_task = if args.progress {
            let (tx, rx) = mpsc::unbounded_channel();
            coordinator = coordinator.with_events(tx);
            Some(tokio::spawn(report_progress(rx)))
        } else {
            None
        };

        let mut files = Vec::new();
        for path in &args.inputs {
            if args.progress || verbose {
                eprintln!("Loading {}", path.display());
            }
            let outcome = coordinator
                .load(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?;
            files.push(FileReport::from(&outcome));
        }

        let dataset = coordinator.dataset();
        drop(coordinator);
        if let Some(task) = progress_task {
            let _ = task.await;
        }

        let dataset = dataset.lock().await;
        let report = LoadReport {
            files,
            dataset: dataset.summary(),
            region: region.map(|r| query_region(&dataset, r)).transpose()?,
        };

        match format {
            OutputFormat::Text => print_text(&report, verbose),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Tsv => print_tsv(&report),
        }
        Ok::<_, anyhow::Error>(())
    })
}

fn print_text(report: &LoadReport, verbose: bool) {
    for file in &report.files {
        println!(
            "{} [{}, {}{}]: {} records, {} malformed, {} dropped",
            file.path.display(),
            file.format,
            file.strategy,
            if file.escalated { ", escalated" } else { "" },
            file.records,
            file.malformed,
            file.dropped
        );
        if verbose {
            for warning in &file.warnings {
                println!("   warning: {warning:?}");
            }
        }
    }

    let summary = &report.dataset;
    println!();
    println!("Sequences: {}", summary.sequences.len());
    for (name, length) in &summary.sequences {
        println!("   {name}: {length} bp");
    }
    println!(
        "Features: {} on {} chromosomes",
        summary.features.values().sum::<usize>(),
        summary.features.len()
    );
    println!(
        "Variants: {} on {} chromosomes",
        summary.variants.values().sum::<usize>(),
        summary.variants.len()
    );
    println!("Tracks: {}", summary.tracks.len());
    for (name, intervals) in &summary.tracks {
        println!("   {name}: {intervals} intervals");
    }
    if let Some(alignment) = &summary.alignment {
        println!("Alignment: {alignment}");
    }

    if let Some(region) = &report.region {
        println!();
        println!(
            "Region {}:{}-{}",
            region.region.chromosome,
            region.region.span.start + 1,
            region.region.span.end
        );
        for feature in &region.features {
            println!(
                "   feature {} {}-{} {} {}",
                feature.kind,
                feature.start(),
                feature.end(),
                feature.strand,
                feature.name.as_deref().unwrap_or("-")
            );
        }
        for variant in &region.variants {
            println!(
                "   variant {} {} {}>{}",
                variant.id.as_deref().unwrap_or("."),
                variant.start() + 1,
                variant.reference,
                variant.alternate
            );
        }
        println!("   reads: {}", region.reads.len());
        for (name, values) in &region.tracks {
            println!("   track {name}: {} values", values.len());
        }
    }
}

fn print_tsv(report: &LoadReport) {
    println!("category\tkey\tcount");
    let summary = &report.dataset;
    for (name, length) in &summary.sequences {
        println!("sequence\t{name}\t{length}");
    }
    for (name, count) in &summary.features {
        println!("features\t{name}\t{count}");
    }
    for (name, count) in &summary.variants {
        println!("variants\t{name}\t{count}");
    }
    for (name, count) in &summary.tracks {
        println!("track\t{name}\t{count}");
    }
}
