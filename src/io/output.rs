//! Results export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::IoError;
use crate::models::AggregatedRecord;

const HEADER: [&str; 4] = ["DOI", "Title", "Authors", "Year"];
const TARGETS_HEADER: &str = "Cited DOIs";

/// Write records as CSV: `DOI,Title,Authors,Year` plus `Cited DOIs` when
/// `include_targets` is set. Missing fields are written as empty cells.
pub fn write_records<W: Write>(
    writer: W,
    records: &[AggregatedRecord],
    include_targets: bool,
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);

    if include_targets {
        csv.write_record(HEADER.iter().copied().chain([TARGETS_HEADER]))?;
    } else {
        csv.write_record(HEADER)?;
    }

    for record in records {
        let year = record.year().map(|y| y.to_string()).unwrap_or_default();
        let mut row = vec![
            record.doi.to_string(),
            record.title().unwrap_or_default().to_string(),
            record.authors_joined(),
            year,
        ];
        if include_targets {
            row.push(
                record
                    .cites
                    .iter()
                    .map(|d| d.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            );
        }
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

/// Write records to `path`, creating parent directories
///
/// The file starts with a UTF-8 byte order mark so spreadsheet software
/// detects the encoding.
pub fn write_csv(
    path: &Path,
    records: &[AggregatedRecord],
    include_targets: bool,
) -> Result<(), IoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = BufWriter::new(File::create(path)?);
    file.write_all("\u{feff}".as_bytes())?;
    write_records(&mut file, records, include_targets)?;
    file.flush()?;

    tracing::info!(path = %path.display(), rows = records.len(), "Results written");
    Ok(())
}

/// `Citation_Results_<YYYYmmdd_HHMMSS>.csv`
pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("Citation_Results_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Pick the export destination
///
/// An explicit file path wins. Otherwise a timestamped file name goes in
/// the preferred directory when it exists, else in the working directory.
pub fn resolve_output_path(
    explicit: Option<&Path>,
    preferred_dir: Option<&Path>,
    now: DateTime<Local>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let file_name = default_file_name(now);
    match preferred_dir {
        Some(dir) if dir.is_dir() => dir.join(file_name),
        Some(dir) => {
            tracing::warn!(
                dir = %dir.display(),
                "Preferred output directory not available, using working directory"
            );
            PathBuf::from(file_name)
        }
        None => PathBuf::from(file_name),
    }
}
