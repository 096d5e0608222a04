//! Drives a whole run: resolve targets, aggregate each one, report.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::{
    AggregateOutcome, CitationAggregator, JournalResolver, MetadataResolver, ProviderFailure,
    ResultSet,
};
use crate::config::PipelineSettings;
use crate::models::{AggregatedRecord, Doi, JournalId, ProviderKind};
use crate::sources::{SourceError, SourceRegistry};

/// What to find citers for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineInput {
    /// Raw DOI strings, normalized and deduplicated before use
    Dois(Vec<String>),
    /// A journal identifier such as `J297249`
    Journal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Resolving,
    TargetIteration,
    Aggregating,
    Done,
    Failed,
    Cancelled,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Resolving => "resolving",
            PipelineState::TargetIteration => "target iteration",
            PipelineState::Aggregating => "aggregating",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of a run
#[derive(Debug)]
pub enum RunOutcome {
    Done,
    Failed(SourceError),
    Cancelled,
}

/// An input string that is not a usable DOI
#[derive(Debug)]
pub struct InvalidInput {
    pub input: String,
    pub error: SourceError,
}

/// Per-target summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub target: Doi,
    pub sightings: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed_providers: Vec<ProviderKind>,
    pub metadata_misses: usize,
}

impl TargetOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.failed_providers.is_empty()
    }
}

impl From<&AggregateOutcome> for TargetOutcome {
    fn from(outcome: &AggregateOutcome) -> Self {
        Self {
            target: outcome.target.clone(),
            sightings: outcome.sightings,
            inserted: outcome.inserted,
            updated: outcome.updated,
            failed_providers: outcome
                .failures
                .iter()
                .map(|f| f.provider.clone())
                .collect(),
            metadata_misses: outcome.metadata_misses,
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,

    /// Merged citing works in first-sighting order
    pub records: Vec<AggregatedRecord>,

    /// Targets after normalization and dedup (or journal resolution)
    pub targets: Vec<Doi>,
    pub invalid_inputs: Vec<InvalidInput>,

    /// One entry per target actually aggregated, in target order
    pub target_outcomes: Vec<TargetOutcome>,
    pub failures: Vec<ProviderFailure>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            outcome: RunOutcome::Done,
            records: Vec::new(),
            targets: Vec::new(),
            invalid_inputs: Vec::new(),
            target_outcomes: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// The terminal state the run ended in
    pub fn state(&self) -> PipelineState {
        match self.outcome {
            RunOutcome::Done => PipelineState::Done,
            RunOutcome::Failed(_) => PipelineState::Failed,
            RunOutcome::Cancelled => PipelineState::Cancelled,
        }
    }

    /// Targets for which at least one provider failed
    pub fn degraded_targets(&self) -> Vec<&Doi> {
        self.target_outcomes
            .iter()
            .filter(|o| o.is_degraded())
            .map(|o| &o.target)
            .collect()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled)
    }

    /// The run failed outright, or finished with nothing while providers failed.
    /// A cancelled run is never a failure.
    pub fn is_failure(&self) -> bool {
        match self.outcome {
            RunOutcome::Failed(_) => true,
            RunOutcome::Cancelled => false,
            RunOutcome::Done => self.records.is_empty() && !self.failures.is_empty(),
        }
    }
}

/// Progress callbacks; every method defaults to doing nothing
pub trait PipelineObserver: Send + Sync {
    fn on_state(&self, _state: PipelineState) {}

    /// Called once the target list is known
    fn on_targets(&self, _count: usize) {}

    fn on_target_done(&self, _outcome: &TargetOutcome) {}
}

/// Observer that ignores every event
#[derive(Debug, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// The run orchestrator
///
/// Provider queries for up to `concurrency` targets are in flight at once;
/// results are merged strictly in target order, so field ties resolve the
/// same way regardless of timing. Cancellation is observed between targets
/// (and inside provider retry loops); whatever was merged before the stop is
/// still returned.
pub struct Pipeline {
    aggregator: CitationAggregator,
    journal: Option<JournalResolver>,
    concurrency: usize,
    cancel: CancellationToken,
    observer: Arc<dyn PipelineObserver>,
}

impl Pipeline {
    pub fn new(
        registry: &SourceRegistry,
        settings: &PipelineSettings,
        cancel: CancellationToken,
    ) -> Self {
        let mut aggregator = CitationAggregator::new(registry.citation_sources());
        let metadata_sources = registry.metadata_sources();
        if settings.enrich_metadata && !metadata_sources.is_empty() {
            aggregator = aggregator.with_metadata(
                Arc::new(MetadataResolver::new(metadata_sources)),
                settings.metadata_concurrency,
            );
        }

        Self {
            aggregator,
            journal: JournalResolver::from_registry(registry),
            concurrency: settings.concurrency.max(1),
            cancel,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute one run to a terminal state
    pub async fn run(&self, input: PipelineInput) -> RunReport {
        let mut report = RunReport::new();
        let results = ResultSet::new();

        self.observer.on_state(PipelineState::Resolving);
        let targets = match input {
            PipelineInput::Dois(raw) => {
                let (targets, invalid) = normalize_targets(raw);
                report.invalid_inputs = invalid;
                targets
            }
            PipelineInput::Journal(raw) => match self.resolve_journal(&raw).await {
                Ok(targets) => targets,
                Err(error) => {
                    report.outcome = match error {
                        SourceError::Cancelled => RunOutcome::Cancelled,
                        error => {
                            tracing::error!("Journal {} could not be resolved: {}", raw, error);
                            RunOutcome::Failed(error)
                        }
                    };
                    self.observer.on_state(report.state());
                    return report;
                }
            },
        };

        tracing::info!(targets = targets.len(), "Targets resolved");
        report.targets = targets;
        self.observer.on_targets(report.targets.len());
        self.observer.on_state(PipelineState::TargetIteration);

        let cancelled = self.iterate(&results, &mut report).await;

        report.records = results.into_records();
        if cancelled {
            tracing::warn!(
                completed = report.target_outcomes.len(),
                total = report.targets.len(),
                "Run cancelled, keeping partial results"
            );
            report.outcome = RunOutcome::Cancelled;
        }
        self.observer.on_state(report.state());
        report
    }

    /// Returns true if the run was cancelled before every target was merged
    ///
    /// Harvests keep running while a target is merged and enriched; finished
    /// harvests queue up and are merged strictly in target order.
    async fn iterate(&self, results: &ResultSet, report: &mut RunReport) -> bool {
        let targets = report.targets.clone();
        let harvests = stream::iter(targets.iter())
            .map(|target| self.aggregator.harvest(target))
            .buffered(self.concurrency);
        let mut harvests = std::pin::pin!(harvests);
        let mut ready = VecDeque::new();
        let mut exhausted = false;
        let mut aggregating = false;

        loop {
            if self.cancel.is_cancelled() {
                return true;
            }

            let harvest = match ready.pop_front() {
                Some(harvest) => harvest,
                None if exhausted => return false,
                None => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return true,
                    next = harvests.next() => match next {
                        Some(harvest) => harvest,
                        None => return false,
                    },
                },
            };

            if !aggregating {
                aggregating = true;
                self.observer.on_state(PipelineState::Aggregating);
            }

            let merge = self.aggregator.merge(harvest, results);
            let mut merge = std::pin::pin!(merge);
            let outcome = loop {
                tokio::select! {
                    biased;
                    outcome = &mut merge => break outcome,
                    next = harvests.next(), if !exhausted => match next {
                        Some(harvest) => ready.push_back(harvest),
                        None => exhausted = true,
                    },
                }
            };

            let summary = TargetOutcome::from(&outcome);
            self.observer.on_target_done(&summary);
            report.target_outcomes.push(summary);

            let cancelled = outcome.cancelled;
            report.failures.extend(outcome.failures);
            if cancelled {
                return true;
            }
        }
    }

    async fn resolve_journal(&self, raw: &str) -> Result<Vec<Doi>, SourceError> {
        let journal = JournalId::parse(raw)?;
        let resolver = self.journal.as_ref().ok_or_else(|| {
            SourceError::NotFound("No journal listing source configured".to_string())
        })?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SourceError::Cancelled),
            listing = resolver.resolve_all(&journal) => listing,
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("aggregator", &self.aggregator)
            .field("journal", &self.journal)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

/// Normalize, drop blanks, and collapse duplicates keeping first occurrence
fn normalize_targets(raw: Vec<String>) -> (Vec<Doi>, Vec<InvalidInput>) {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    let mut invalid = Vec::new();

    for input in raw {
        if input.trim().is_empty() {
            continue;
        }
        match Doi::parse(&input) {
            Ok(doi) => {
                if seen.insert(doi.clone()) {
                    targets.push(doi);
                } else {
                    tracing::debug!(doi = %doi, "Duplicate target collapsed");
                }
            }
            Err(error) => {
                tracing::warn!("Skipping invalid DOI {:?}: {}", input, error);
                invalid.push(InvalidInput { input, error });
            }
        }
    }

    (targets, invalid)
}
