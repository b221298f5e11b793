//! File format detection by extension.
//!
//! | Extensions | Format |
//! |------------|--------|
//! | `fa`, `fasta`, `fna`, `fas` | Sequence |
//! | `gb`, `gbk`, `genbank` | Annotated record |
//! | `gff`, `gff3`, `gtf` | Interval annotation (GFF-like) |
//! | `bed` | Interval annotation (BED-like) |
//! | `vcf` | Variant |
//! | `sam` | Alignment (text) |
//! | `bam` | Alignment (binary) |
//! | `wig` | Numeric track |
//!
//! Matching is case-insensitive, and a trailing `.gz` / `.bgz` is ignored so
//! `calls.VCF.gz` is detected as a variant file.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Dialect of an interval annotation file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalFamily {
    GffLike,
    BedLike,
}

/// Encoding of an alignment file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentEncoding {
    /// SAM; decodable line by line and streamable
    Text,
    /// BAM; delegated to the binary alignment provider
    Binary,
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// FASTA raw sequence
    Sequence,
    /// GenBank flat file
    AnnotatedRecord,
    /// GFF/GTF or BED intervals
    IntervalAnnotation(IntervalFamily),
    /// VCF variant calls
    Variant,
    /// SAM or BAM alignments
    Alignment(AlignmentEncoding),
    /// Wiggle numeric track
    NumericTrack,
}

/// Display layers a format can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayCategory {
    Sequence,
    Features,
    Variants,
    Reads,
    Coverage,
    Signal,
}

impl fmt::Display for DisplayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sequence => "sequence",
            Self::Features => "features",
            Self::Variants => "variants",
            Self::Reads => "reads",
            Self::Coverage => "coverage",
            Self::Signal => "signal",
        };
        f.write_str(name)
    }
}

/// Every supported extension with its format, in display order
pub const SUPPORTED_EXTENSIONS: &[(&str, FileFormat)] = &[
    ("fa", FileFormat::Sequence),
    ("fasta", FileFormat::Sequence),
    ("fna", FileFormat::Sequence),
    ("fas", FileFormat::Sequence),
    ("gb", FileFormat::AnnotatedRecord),
    ("gbk", FileFormat::AnnotatedRecord),
    ("genbank", FileFormat::AnnotatedRecord),
    ("gff", FileFormat::IntervalAnnotation(IntervalFamily::GffLike)),
    ("gff3", FileFormat::IntervalAnnotation(IntervalFamily::GffLike)),
    ("gtf", FileFormat::IntervalAnnotation(IntervalFamily::GffLike)),
    ("bed", FileFormat::IntervalAnnotation(IntervalFamily::BedLike)),
    ("vcf", FileFormat::Variant),
    ("sam", FileFormat::Alignment(AlignmentEncoding::Text)),
    ("bam", FileFormat::Alignment(AlignmentEncoding::Binary)),
    ("wig", FileFormat::NumericTrack),
];

/// Compression suffixes ignored during detection
const COMPRESSION_SUFFIXES: &[&str] = &["gz", "bgz"];

impl FileFormat {
    /// Look up a bare extension (without the dot), case-insensitively
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        SUPPORTED_EXTENSIONS
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, format)| *format)
    }

    /// Label recorded in the load ledger
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Sequence => "FASTA",
            Self::AnnotatedRecord => "GenBank",
            Self::IntervalAnnotation(IntervalFamily::GffLike) => "GFF",
            Self::IntervalAnnotation(IntervalFamily::BedLike) => "BED",
            Self::Variant => "VCF",
            Self::Alignment(AlignmentEncoding::Text) => "SAM",
            Self::Alignment(AlignmentEncoding::Binary) => "BAM",
            Self::NumericTrack => "Wiggle",
        }
    }

    /// Display layers enabled once a file of this format has loaded
    #[must_use]
    pub fn display_categories(self) -> &'static [DisplayCategory] {
        match self {
            Self::Sequence => &[DisplayCategory::Sequence],
            Self::AnnotatedRecord => &[DisplayCategory::Sequence, DisplayCategory::Features],
            Self::IntervalAnnotation(_) => &[DisplayCategory::Features],
            Self::Variant => &[DisplayCategory::Variants],
            Self::Alignment(_) => &[DisplayCategory::Reads, DisplayCategory::Coverage],
            Self::NumericTrack => &[DisplayCategory::Signal],
        }
    }

    /// Whether the format may be decoded chunk by chunk
    #[must_use]
    pub fn is_streamable(self) -> bool {
        matches!(self, Self::Alignment(AlignmentEncoding::Text))
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The extension that decides the format: lower-cased, without the dot, and
/// with a trailing compression suffix removed. Empty if the name has none.
#[must_use]
pub fn effective_extension(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let mut stem = name.as_str();
    if let Some((rest, ext)) = stem.rsplit_once('.') {
        if COMPRESSION_SUFFIXES.contains(&ext) {
            stem = rest;
        }
    }

    stem.rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

/// Whether the name carries a compression suffix
#[must_use]
pub fn is_compressed_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| COMPRESSION_SUFFIXES.contains(&e.to_ascii_lowercase().as_str()))
}

/// Detect the format of a path from its name
#[must_use]
pub fn detect_format_from_path(path: &Path) -> Option<FileFormat> {
    FileFormat::from_extension(&effective_extension(path))
}

/// Comma-separated list of every supported extension
#[must_use]
pub fn supported_extensions_list() -> String {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|(ext, _)| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_detection() {
        assert_eq!(FileFormat::from_extension("fa"), Some(FileFormat::Sequence));
        assert_eq!(FileFormat::from_extension("FASTA"), Some(FileFormat::Sequence));
        assert_eq!(
            FileFormat::from_extension("gbk"),
            Some(FileFormat::AnnotatedRecord)
        );
        assert_eq!(
            FileFormat::from_extension("gtf"),
            Some(FileFormat::IntervalAnnotation(IntervalFamily::GffLike))
        );
        assert_eq!(
            FileFormat::from_extension(".bed"),
            Some(FileFormat::IntervalAnnotation(IntervalFamily::BedLike))
        );
        assert_eq!(
            FileFormat::from_extension("bam"),
            Some(FileFormat::Alignment(AlignmentEncoding::Binary))
        );
        assert_eq!(FileFormat::from_extension("wig"), Some(FileFormat::NumericTrack));
        assert_eq!(FileFormat::from_extension("xyz"), None);
        assert_eq!(FileFormat::from_extension(""), None);
    }

    #[test]
    fn test_path_detection_strips_compression() {
        assert_eq!(
            detect_format_from_path(Path::new("/data/calls.VCF.gz")),
            Some(FileFormat::Variant)
        );
        assert_eq!(
            detect_format_from_path(Path::new("genome.fa.bgz")),
            Some(FileFormat::Sequence)
        );
        assert_eq!(detect_format_from_path(Path::new("archive.gz")), None);
        assert_eq!(detect_format_from_path(Path::new("README")), None);
        assert_eq!(effective_extension(Path::new("reads.sam")), "sam");
        assert!(is_compressed_name(Path::new("x.gff.GZ")));
        assert!(!is_compressed_name(Path::new("x.gff")));
    }

    #[test]
    fn test_supported_list_mentions_every_extension() {
        let list = supported_extensions_list();
        for (ext, _) in SUPPORTED_EXTENSIONS {
            assert!(list.contains(&format!(".{ext}")));
        }
    }

    #[test]
    fn test_categories_and_streamability() {
        assert!(FileFormat::Alignment(AlignmentEncoding::Text).is_streamable());
        assert!(!FileFormat::Alignment(AlignmentEncoding::Binary).is_streamable());
        assert!(!FileFormat::Variant.is_streamable());
        assert_eq!(
            FileFormat::AnnotatedRecord.display_categories(),
            &[DisplayCategory::Sequence, DisplayCategory::Features]
        );
    }
}
