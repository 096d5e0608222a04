//! # who-cited
//!
//! Finds the works that cite a set of target DOIs (or every article of a
//! Crossref journal), merging citers reported by several providers into one
//! deduplicated, metadata-enriched result set.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Identifiers and citing-work records
//! - [`sources`]: Provider plugins (OpenAlex, OpenCitations, Crossref) behind the
//!   capability-flagged [`Source`] trait
//! - [`pipeline`]: Journal resolution, per-target aggregation, metadata
//!   enrichment and the run orchestrator
//! - [`io`]: DOI-list input and CSV export
//! - [`utils`]: HTTP client, retry/backoff, rate limiting, identifier validation
//! - [`config`]: Configuration management
//! - [`ui`]: Progress and summary rendering for the CLI
//!
//! ## Example
//!
//! ```rust,no_run
//! use who_cited::config::Config;
//! use who_cited::pipeline::{Pipeline, PipelineInput};
//! use who_cited::sources::SourceRegistry;
//! use who_cited::utils::HttpClient;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let cancel = CancellationToken::new();
//! let http = HttpClient::from_config(&config.http)?;
//! let registry = SourceRegistry::from_config(&config, http, cancel.clone())?;
//!
//! let pipeline = Pipeline::new(&registry, &config.pipeline, cancel);
//! let report = pipeline
//!     .run(PipelineInput::Dois(vec!["10.1038/nature12373".to_string()]))
//!     .await;
//! println!("{} citing works", report.records.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{AggregatedRecord, CitingRecord, Doi, JournalId};
pub use pipeline::{Pipeline, PipelineInput, RunReport};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
