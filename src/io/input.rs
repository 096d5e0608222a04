//! DOI-list input.

use std::borrow::Cow;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::{GBK, UTF_8, WINDOWS_1252};

use super::IoError;
use crate::utils::normalize_doi;

/// Read raw DOI strings from a CSV file
///
/// See [`parse_dois`] for how columns are chosen. The strings are returned
/// as written; validation happens when the run starts.
pub fn read_dois(path: &Path) -> Result<Vec<String>, IoError> {
    let bytes = std::fs::read(path)?;
    let content = decode(&bytes);
    Ok(parse_dois(&content)?)
}

/// Decode file bytes as UTF-8 (BOM stripped), then GBK, then Windows-1252
///
/// Spreadsheets saved on Chinese-locale systems are commonly GBK. The last
/// fallback maps every byte, so decoding never fails.
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text;
    }

    let (text, had_errors) = GBK.decode_without_bom_handling(bytes);
    if !had_errors {
        tracing::debug!("DOI list decoded as GBK");
        return text;
    }

    tracing::debug!("DOI list decoded as Windows-1252");
    WINDOWS_1252.decode_without_bom_handling(bytes).0
}

/// Extract DOI strings from CSV text
///
/// If the first row has a cell mentioning "doi" that is not itself a DOI,
/// that row is a header and every non-empty cell of that column is taken.
/// Otherwise every cell of every row is scanned and DOI-shaped cells are
/// taken.
pub fn parse_dois(content: &str) -> Result<Vec<String>, csv::Error> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = reader.records();
    let Some(first) = rows.next().transpose()? else {
        return Ok(Vec::new());
    };

    let mut dois = Vec::new();
    match header_column(&first) {
        Some(column) => {
            for row in rows {
                if let Some(cell) = row?.get(column).filter(|cell| !cell.is_empty()) {
                    dois.push(cell.to_string());
                }
            }
        }
        None => {
            scan_row(&first, &mut dois);
            for row in rows {
                scan_row(&row?, &mut dois);
            }
        }
    }

    Ok(dois)
}

fn header_column(row: &StringRecord) -> Option<usize> {
    row.iter()
        .position(|cell| cell.to_lowercase().contains("doi") && normalize_doi(cell).is_err())
}

fn scan_row(row: &StringRecord, dois: &mut Vec<String>) {
    dois.extend(
        row.iter()
            .filter(|cell| normalize_doi(cell).is_ok())
            .map(String::from),
    );
}
