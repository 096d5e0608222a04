//! Core data models for identifiers and citing-work records.

mod doi;
mod record;

pub use doi::{Doi, JournalId};
pub use record::{AggregatedRecord, CitingRecord, Metadata, ProviderKind};
