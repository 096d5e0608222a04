//! The citation-discovery pipeline.
//!
//! - [`JournalResolver`]: journal identifier to article DOIs
//! - [`CitationAggregator`]: query every citation provider for one target and
//!   merge the citers into the shared [`ResultSet`]
//! - [`MetadataResolver`]: fill in title/authors/year for bare citation links
//! - [`Pipeline`]: the run state machine
//!   (`Resolving -> TargetIteration -> Aggregating -> Done | Failed | Cancelled`)

mod aggregator;
mod journal;
mod metadata;
mod orchestrator;
mod result_set;

pub use aggregator::{AggregateOutcome, CitationAggregator, ProviderFailure, TargetHarvest};
pub use journal::JournalResolver;
pub use metadata::MetadataResolver;
pub use orchestrator::{
    InvalidInput, NoopObserver, Pipeline, PipelineInput, PipelineObserver, PipelineState,
    RunOutcome, RunReport, TargetOutcome,
};
pub use result_set::{ResultSet, Upsert};
