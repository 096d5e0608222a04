//! Reading DOI lists and exporting results.

mod input;
mod output;

pub use input::{parse_dois, read_dois};
pub use output::{default_file_name, resolve_output_path, write_csv, write_records};

/// Errors reading input or writing results
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
