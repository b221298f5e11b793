//! End-to-end loads through the ingestion coordinator
//!
//! Each test writes small files to a temporary directory and loads them with
//! [`IngestCoordinator::local`], checking what ends up in the shared dataset.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use tokio::sync::mpsc;

use genome_ingest::ingest::coordinator::{Completion, IngestState};
use genome_ingest::ingest::format_detection::DisplayCategory;
use genome_ingest::ingest::strategy::Strategy;
use genome_ingest::{
    CancelFlag, FileFormat, IngestConfig, IngestCoordinator, IngestError, IngestEvent, Strand,
    ZeroBasedSpan,
};

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn write_gz(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

fn sam_text(reads: usize) -> String {
    let mut text = String::from("@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:100000\n");
    for i in 0..reads {
        text.push_str(&format!(
            "read{i}\t0\tchr1\t{}\t60\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII\n",
            i * 10 + 1
        ));
    }
    text
}

fn drain(rx: &mut mpsc::UnboundedReceiver<IngestEvent>) -> Vec<IngestEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_fasta_keys_drop_description() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "genome.fa", ">chr1 desc\nACGT\nACGT\n>chr2\nGGCC\n");

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    let outcome = coordinator.load(&path).await.unwrap();
    assert_eq!(outcome.request.format, FileFormat::Sequence);
    assert_eq!(outcome.signal.categories, vec![DisplayCategory::Sequence]);
    assert!(!outcome.signal.refresh_needed);

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let keys: Vec<&str> = dataset.sequences().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["chr1", "chr2"]);
    assert_eq!(dataset.sequence("chr1"), Some("ACGTACGT"));
}

#[tokio::test]
async fn test_bed_coordinates_become_one_based() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "peaks.bed", "chr1\t10\t20\tfoo\t500\t+\n");

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    coordinator.load(&path).await.unwrap();

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let features = dataset.features("chr1");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].start(), 11);
    assert_eq!(features[0].end(), 20);
    assert_eq!(features[0].strand, Strand::Forward);
    assert_eq!(features[0].strand.as_i8(), 1);
    assert_eq!(features[0].name.as_deref(), Some("foo"));
    assert_eq!(features[0].score, Some(500.0));
}

#[tokio::test]
async fn test_vcf_coordinates_become_zero_based() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "calls.vcf",
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\nchr1\t100\t.\tA\tG\t.\t.\t.\n",
    );

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    coordinator.load(&path).await.unwrap();

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let variants = dataset.variants_on("chr1");
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].start(), 99);
    assert_eq!(variants[0].end(), 100);
    assert_eq!(variants[0].id, None);
    assert_eq!(dataset.variants_in("chr1", &ZeroBasedSpan::new(99, 100)).len(), 1);
    assert!(dataset.variants_in("chr1", &ZeroBasedSpan::new(100, 200)).is_empty());
}

#[tokio::test]
async fn test_gff_loads_append_in_order() {
    let dir = TempDir::new().unwrap();
    let a = write_file(&dir, "a.gff3", "##gff-version 3\nchr1\tsrc\tgene\t100\t200\t.\t+\t.\tID=f1\n");
    let b = write_file(&dir, "b.gff3", "##gff-version 3\nchr1\tsrc\tgene\t50\t80\t.\t-\t.\tID=f2\n");

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    coordinator.load(&a).await.unwrap();
    coordinator.load(&b).await.unwrap();

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let names: Vec<&str> = dataset
        .features("chr1")
        .iter()
        .filter_map(|f| f.name.as_deref())
        .collect();
    assert_eq!(names, vec!["f1", "f2"]);
    assert_eq!(dataset.loaded_files().len(), 2);
    assert_eq!(dataset.loaded_files()[0].kind, "GFF");
}

#[tokio::test]
async fn test_track_name_collision_renames() {
    let dir = TempDir::new().unwrap();
    let first = write_file(
        &dir,
        "one.wig",
        "track type=wiggle_0 name=Signal\nvariableStep chrom=chr1 span=10\n1 5.0\n",
    );
    let second = write_file(
        &dir,
        "two.wig",
        "track type=wiggle_0 name=Signal\nvariableStep chrom=chr1 span=10\n1 7.0\n",
    );

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    coordinator.load(&first).await.unwrap();
    let outcome = coordinator.load(&second).await.unwrap();
    assert_eq!(outcome.merge.tracks, vec!["Signal_1".to_string()]);

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let query = ZeroBasedSpan::new(0, 10);
    let original = dataset.track("Signal").unwrap().values_in("chr1", &query);
    let renamed = dataset.track("Signal_1").unwrap().values_in("chr1", &query);
    assert_eq!(original.len(), 1);
    assert_eq!(original[0].value, 5.0);
    assert_eq!(renamed.len(), 1);
    assert_eq!(renamed[0].value, 7.0);
}

#[tokio::test]
async fn test_genbank_continuations_and_translation() {
    let protein = "M".repeat(150);
    let lines = [
        "LOCUS       NC_TEST  60 bp    DNA     linear".to_string(),
        "FEATURES             Location/Qualifiers".to_string(),
        "     CDS             1..60".to_string(),
        "                     /gene=\"abcD\"".to_string(),
        "                     /note=\"first line".to_string(),
        "                     second line".to_string(),
        "                     third line\"".to_string(),
        format!("                     /translation=\"{}", &protein[..50]),
        format!("                     {}", &protein[50..100]),
        format!("                     {}\"", &protein[100..]),
        "ORIGIN".to_string(),
        "        1 acgtacgtac gtacgtacgt acgtacgtac gtacgtacgt acgtacgtac gtacgtacgt".to_string(),
        "//".to_string(),
    ];
    let text = lines.join("\n") + "\n";
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "record.gbk", &text);

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    let outcome = coordinator.load(&path).await.unwrap();
    assert_eq!(
        outcome.signal.categories,
        vec![DisplayCategory::Sequence, DisplayCategory::Features]
    );

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    assert_eq!(dataset.sequence("NC_TEST").map(str::len), Some(60));

    let cds = &dataset.features("NC_TEST")[0];
    assert_eq!(cds.kind, "CDS");
    assert_eq!(cds.name.as_deref(), Some("abcD"));
    assert_eq!(
        cds.qualifiers.first("note"),
        Some("first line second line third line")
    );
    let translation = cds.qualifiers.first("translation").unwrap();
    assert!(translation.ends_with("..."));
    assert!(translation.chars().count() <= 103);
}

#[tokio::test]
async fn test_large_sam_is_streamed_in_chunks() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "reads.sam", &sam_text(200));

    let config = IngestConfig {
        streaming_threshold_bytes: 1024,
        chunk_lines: 25,
        ..IngestConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let coordinator = IngestCoordinator::local(config).with_events(tx);
    let outcome = coordinator.load(&path).await.unwrap();
    assert_eq!(outcome.request.strategy, Strategy::Streamed);
    assert!(!outcome.escalated);
    assert_eq!(outcome.merge.reads_loaded, 200);

    let events = drain(&mut rx);
    let chunks = events
        .iter()
        .filter(|e| matches!(e, IngestEvent::Chunk { .. }))
        .count();
    assert!(chunks >= 2, "expected several chunks, got {chunks}");

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            IngestEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last(), Some(&100));
    assert!(matches!(events.last(), Some(IngestEvent::Loaded(_))));

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let reads = dataset.fetch_reads("chr1", ZeroBasedSpan::new(0, 30)).unwrap();
    assert_eq!(reads.len(), 3);
    assert_eq!(reads[0].id, "read0");
}

#[tokio::test]
async fn test_unsupported_extension_lists_supported() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.xyz", "hello\n");

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    let err = coordinator.load(&path).await.unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat { .. }));

    let message = err.to_string();
    assert!(message.contains(".xyz"));
    for ext in [".fa", ".gbk", ".gff", ".bed", ".vcf", ".sam", ".bam", ".wig"] {
        assert!(message.contains(ext), "missing {ext} in {message}");
    }
    assert!(matches!(
        coordinator.state(),
        IngestState::Idle(Some(Completion::Failed(_)))
    ));
}

#[tokio::test]
async fn test_whole_read_escalates_to_streaming() {
    let dir = TempDir::new().unwrap();
    let mut text = String::new();
    for i in 0..50 {
        text.push_str(&format!("chr1\t{}\t.\tA\tT\t.\t.\t.\n", i + 1));
    }
    let path = write_file(&dir, "many.vcf", &text);

    let config = IngestConfig {
        max_whole_read_bytes: 64,
        chunk_lines: 10,
        ..IngestConfig::default()
    };
    let coordinator = IngestCoordinator::local(config);
    let outcome = coordinator.load(&path).await.unwrap();
    assert!(outcome.escalated);
    assert_eq!(outcome.request.strategy, Strategy::Streamed);
    assert_eq!(outcome.merge.variants_added, 50);
    assert_eq!(coordinator.state(), IngestState::Idle(Some(Completion::Success)));
}

#[tokio::test]
async fn test_cancelled_load_leaves_dataset_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "reads.sam", &sam_text(100));

    let config = IngestConfig {
        streaming_threshold_bytes: 512,
        chunk_lines: 10,
        ..IngestConfig::default()
    };
    let coordinator = IngestCoordinator::local(config);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = coordinator.load_with_cancel(&path, &cancel).await.unwrap_err();
    assert!(matches!(err, IngestError::Cancelled(_)));

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    assert!(dataset.alignment().is_none());
    assert!(dataset.loaded_files().is_empty());
}

#[tokio::test]
async fn test_refresh_needed_after_sequence_present() {
    let dir = TempDir::new().unwrap();
    let fasta = write_file(&dir, "genome.fa", ">chr1\nACGT\n");
    let bed = write_file(&dir, "genes.bed", "chr1\t0\t4\tg1\n");

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    let first = coordinator.load(&bed).await.unwrap();
    assert!(!first.signal.refresh_needed);
    coordinator.load(&fasta).await.unwrap();
    let again = coordinator.load(&bed).await.unwrap();
    assert!(again.signal.refresh_needed);
    assert_eq!(again.signal.categories, vec![DisplayCategory::Features]);
}

#[tokio::test]
async fn test_gzip_input_is_decompressed() {
    let dir = TempDir::new().unwrap();
    let path = write_gz(&dir, "calls.vcf.gz", "chr2\t5\trs1\tAC\tA\t30\tPASS\tDP=4\n");

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    let outcome = coordinator.load(&path).await.unwrap();
    assert_eq!(outcome.request.format, FileFormat::Variant);

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let variant = &dataset.variants_on("chr2")[0];
    assert_eq!(variant.id.as_deref(), Some("rs1"));
    assert_eq!((variant.start(), variant.end()), (4, 6));
    assert_eq!(variant.quality, Some(30.0));
}

#[tokio::test]
async fn test_missing_file_reports_io_error() {
    let coordinator = IngestCoordinator::local(IngestConfig::default());
    let err = coordinator
        .load(Path::new("/nonexistent/dir/genome.fa"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Io { .. }));
}

#[tokio::test]
async fn test_invalid_utf8_loads_whole_and_streamed() {
    let dir = TempDir::new().unwrap();
    let vcf = dir.path().join("latin1.vcf");
    std::fs::write(&vcf, b"##comment caf\xe9\nchr1\t10\t.\tA\tG\t.\t.\t.\n").unwrap();
    let sam = dir.path().join("latin1.sam");
    std::fs::write(
        &sam,
        b"@CO\tcaf\xe9\nr1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n",
    )
    .unwrap();

    let whole = IngestCoordinator::local(IngestConfig::default());
    assert_eq!(whole.load(&vcf).await.unwrap().stats.records, 1);
    let outcome = whole.load(&sam).await.unwrap();
    assert_eq!(outcome.request.strategy, Strategy::Whole);
    assert_eq!(outcome.merge.reads_loaded, 1);

    let streamed = IngestCoordinator::local(IngestConfig {
        streaming_threshold_bytes: 0,
        ..IngestConfig::default()
    });
    let outcome = streamed.load(&sam).await.unwrap();
    assert_eq!(outcome.request.strategy, Strategy::Streamed);
    assert_eq!(outcome.merge.reads_loaded, 1);
}

#[tokio::test]
async fn test_concurrent_loads_are_serialized() {
    let dir = TempDir::new().unwrap();
    let mut big = String::from("##gff-version 3\n");
    for i in 0..500 {
        big.push_str(&format!(
            "chr1\tsrc\tgene\t{}\t{}\t.\t+\t.\tID=a{i}\n",
            i * 10 + 1,
            i * 10 + 5
        ));
    }
    let a = write_file(&dir, "a.gff3", &big);
    let b = write_file(&dir, "b.gff3", "chr1\tsrc\tgene\t1\t9\t.\t-\t.\tID=b0\n");

    // Small threshold so the first load yields while decoding
    let config = IngestConfig {
        large_file_line_threshold: 50,
        ..IngestConfig::default()
    };
    let coordinator = IngestCoordinator::local(config);
    let (first, second) = tokio::join!(coordinator.load(&a), coordinator.load(&b));
    assert_eq!(first.unwrap().merge.features_added, 500);
    assert_eq!(second.unwrap().merge.features_added, 1);
    assert_eq!(coordinator.state(), IngestState::Idle(Some(Completion::Success)));

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let order: Vec<&str> = dataset.loaded_files().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(order.len(), 2);

    // Each file's features form one block, in the order the loads merged
    let prefixes: Vec<char> = dataset
        .features("chr1")
        .iter()
        .filter_map(|f| f.name.as_deref().and_then(|n| n.chars().next()))
        .collect();
    assert_eq!(prefixes.len(), 501);
    let mut blocks = prefixes.clone();
    blocks.dedup();
    let expected: Vec<char> = order.iter().filter_map(|name| name.chars().next()).collect();
    assert_eq!(blocks, expected);
}

#[tokio::test]
async fn test_small_whole_load_reports_completion() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "peaks.bed", "chr1\t0\t10\n");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let coordinator = IngestCoordinator::local(IngestConfig::default()).with_events(tx);
    coordinator.load(&path).await.unwrap();

    let percents: Vec<u8> = drain(&mut rx)
        .iter()
        .filter_map(|e| match e {
            IngestEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![100]);
}

mod bam_fixture {
    use std::fs::File;
    use std::num::NonZeroUsize;
    use std::path::Path;

    use noodles::bam;
    use noodles::core::Position;
    use noodles::sam::{
        self,
        alignment::{
            io::Write as _,
            record::{
                cigar::{op::Kind, Op},
                Flags, MappingQuality,
            },
            record_buf::{QualityScores, Sequence},
            RecordBuf,
        },
        header::record::value::{map::ReferenceSequence, Map},
    };

    fn record(name: &str, reference: usize, start: usize, flags: Flags) -> RecordBuf {
        RecordBuf::builder()
            .set_name(name)
            .set_flags(flags)
            .set_reference_sequence_id(reference)
            .set_alignment_start(Position::try_from(start).unwrap())
            .set_mapping_quality(MappingQuality::new(42).unwrap())
            .set_cigar([Op::new(Kind::Match, 4)].into_iter().collect())
            .set_sequence(Sequence::from(b"ACGT".to_vec()))
            .set_quality_scores(QualityScores::from(vec![30, 30, 30, 30]))
            .build()
    }

    /// chr1 (1000 bp) with reads at 11 (+) and 101 (-); chr2 (500 bp) with one read at 1
    pub fn write(path: &Path) {
        let header = sam::Header::builder()
            .add_reference_sequence(
                "chr1",
                Map::<ReferenceSequence>::new(NonZeroUsize::try_from(1000).unwrap()),
            )
            .add_reference_sequence(
                "chr2",
                Map::<ReferenceSequence>::new(NonZeroUsize::try_from(500).unwrap()),
            )
            .build();

        let mut writer = bam::io::Writer::new(File::create(path).unwrap());
        writer.write_header(&header).unwrap();
        for record in [
            record("r1", 0, 11, Flags::empty()),
            record("r2", 0, 101, Flags::REVERSE_COMPLEMENTED),
            record("r3", 1, 1, Flags::empty()),
        ] {
            writer.write_alignment_record(&header, &record).unwrap();
        }
        sam::alignment::io::Write::finish(&mut writer, &header).unwrap();
    }
}

#[tokio::test]
async fn test_bam_reads_fetched_on_demand() {
    use genome_ingest::alignment::bam::NoodlesBamOpener;
    use genome_ingest::alignment::{AlignmentError, AlignmentSource, BinaryAlignmentOpener};

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reads.bam");
    bam_fixture::write(&path);

    let coordinator = IngestCoordinator::local(IngestConfig::default());
    let outcome = coordinator.load(&path).await.unwrap();
    assert!(outcome.merge.on_demand_alignment);
    assert_eq!(
        outcome.signal.categories,
        vec![DisplayCategory::Reads, DisplayCategory::Coverage]
    );

    let dataset = coordinator.dataset();
    let dataset = dataset.lock().await;
    let Some(AlignmentSource::OnDemand(index)) = dataset.alignment() else {
        panic!("expected an on-demand alignment provider");
    };
    let names: Vec<(&str, u64)> = index
        .references()
        .iter()
        .map(|r| (r.name.as_str(), r.length))
        .collect();
    assert_eq!(names, vec![("chr1", 1000), ("chr2", 500)]);
    assert!(!index.has_index());

    let reads = dataset.fetch_reads("chr1", ZeroBasedSpan::new(0, 50)).unwrap();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].id, "r1");
    assert_eq!(reads[0].span, ZeroBasedSpan::new(10, 14));
    assert_eq!(reads[0].strand, Strand::Forward);
    assert_eq!(reads[0].cigar, "4M");
    assert_eq!(reads[0].sequence, "ACGT");
    assert_eq!(reads[0].quality, "????");
    assert_eq!(reads[0].mapping_quality, 42);

    let reads = dataset.fetch_reads("chr1", ZeroBasedSpan::new(0, 1000)).unwrap();
    assert_eq!(reads.len(), 2);
    assert_eq!(reads[1].strand, Strand::Reverse);
    assert_eq!(dataset.fetch_reads("chr2", ZeroBasedSpan::new(0, 500)).unwrap().len(), 1);

    assert!(matches!(
        dataset.fetch_reads("chrX", ZeroBasedSpan::new(0, 10)),
        Err(AlignmentError::UnknownReference(name)) if name == "chrX"
    ));

    std::fs::write(dir.path().join("reads.bam.bai"), b"").unwrap();
    let reopened = NoodlesBamOpener::default().open(&path).unwrap();
    assert!(reopened.has_index());
}
