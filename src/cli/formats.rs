use serde::Serialize;

use crate::cli::OutputFormat;
use crate::ingest::format_detection::SUPPORTED_EXTENSIONS;

#[derive(Serialize)]
struct FormatRow {
    extension: &'static str,
    format: &'static str,
    streamable: bool,
    categories: Vec<String>,
}

fn rows() -> Vec<FormatRow> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|&(extension, format)| FormatRow {
            extension,
            format: format.display_name(),
            streamable: format.is_streamable(),
            categories: format
                .display_categories()
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
        .collect()
}

/// Print every supported extension
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(format: OutputFormat) -> anyhow::Result<()> {
    let rows = rows();
    match format {
        OutputFormat::Text => {
            println!("Supported formats (a trailing .gz or .bgz is also accepted):\n");
            for row in &rows {
                println!(
                    "  .{:<10} {:<8} {}{}",
                    row.extension,
                    row.format,
                    row.categories.join(", "),
                    if row.streamable { " [streamable]" } else { "" }
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Tsv => {
            println!("extension\tformat\tstreamable\tcategories");
            for row in &rows {
                println!(
                    "{}\t{}\t{}\t{}",
                    row.extension,
                    row.format,
                    row.streamable,
                    row.categories.join(",")
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_cover_all_extensions() {
        let rows = rows();
        assert_eq!(rows.len(), SUPPORTED_EXTENSIONS.len());
        let sam = rows.iter().find(|r| r.extension == "sam").unwrap();
        assert!(sam.streamable);
        assert_eq!(sam.format, "SAM");
    }
}
