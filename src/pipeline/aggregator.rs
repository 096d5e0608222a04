//! Per-target citation harvesting and merging.

use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::{stream, StreamExt};

use super::{MetadataResolver, ResultSet, Upsert};
use crate::models::{CitingRecord, Doi, ProviderKind};
use crate::sources::{Source, SourceError};

/// One provider's failure for one target
#[derive(Debug)]
pub struct ProviderFailure {
    pub target: Doi,
    pub provider: ProviderKind,
    pub error: SourceError,
}

/// Everything the providers reported for one target, in provider order
#[derive(Debug)]
pub struct TargetHarvest {
    pub target: Doi,
    pub sightings: Vec<CitingRecord>,
    pub failures: Vec<ProviderFailure>,
    pub cancelled: bool,
}

/// Result of aggregating one target into a [`ResultSet`]
#[derive(Debug)]
pub struct AggregateOutcome {
    pub target: Doi,

    /// Citing records reported across all providers, before dedup
    pub sightings: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failures: Vec<ProviderFailure>,

    /// New records whose metadata could not be resolved
    pub metadata_misses: usize,
    pub cancelled: bool,
}

impl AggregateOutcome {
    /// Count of new or updated records
    pub fn changed(&self) -> usize {
        self.inserted + self.updated
    }

    /// At least one provider failed for this target
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Queries every citation provider for a target and merges the results
///
/// Aggregation never fails as a whole: provider errors are collected into
/// the outcome and the other providers' records are merged regardless.
#[derive(Debug, Clone)]
pub struct CitationAggregator {
    providers: Vec<Arc<dyn Source>>,
    metadata: Option<Arc<MetadataResolver>>,
    metadata_concurrency: usize,
}

impl CitationAggregator {
    pub fn new(providers: Vec<Arc<dyn Source>>) -> Self {
        Self {
            providers,
            metadata: None,
            metadata_concurrency: 1,
        }
    }

    /// Enrich incomplete new records through `resolver`
    pub fn with_metadata(mut self, resolver: Arc<MetadataResolver>, concurrency: usize) -> Self {
        self.metadata = Some(resolver);
        self.metadata_concurrency = concurrency.max(1);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn Source>] {
        &self.providers
    }

    /// Query all providers for `target` concurrently
    ///
    /// Records a provider yielded before failing are kept.
    pub async fn harvest(&self, target: &Doi) -> TargetHarvest {
        let collected = join_all(
            self.providers
                .iter()
                .map(|provider| collect_citers(provider.as_ref(), target)),
        )
        .await;

        let mut harvest = TargetHarvest {
            target: target.clone(),
            sightings: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        };

        for (provider, (records, error)) in self.providers.iter().zip(collected) {
            tracing::debug!(
                target = %target,
                provider = provider.id(),
                citers = records.len(),
                "Provider finished"
            );
            harvest.sightings.extend(records);

            match error {
                None => {}
                Some(SourceError::Cancelled) => harvest.cancelled = true,
                Some(error) => {
                    tracing::warn!(
                        target = %target,
                        provider = provider.id(),
                        "Provider failed: {}",
                        error
                    );
                    harvest.failures.push(ProviderFailure {
                        target: target.clone(),
                        provider: provider.kind(),
                        error,
                    });
                }
            }
        }

        harvest
    }

    /// Merge a harvest into `results`, then enrich the records it created
    pub async fn merge(&self, harvest: TargetHarvest, results: &ResultSet) -> AggregateOutcome {
        let TargetHarvest {
            target,
            sightings,
            failures,
            cancelled,
        } = harvest;

        let mut outcome = AggregateOutcome {
            target,
            sightings: sightings.len(),
            inserted: 0,
            updated: 0,
            failures,
            metadata_misses: 0,
            cancelled,
        };

        let mut created = Vec::new();
        for record in sightings {
            let doi = record.doi.clone();
            match results.upsert(record, &outcome.target) {
                Upsert::Inserted => {
                    outcome.inserted += 1;
                    created.push(doi);
                }
                Upsert::Updated => outcome.updated += 1,
                Upsert::Unchanged => {}
            }
        }

        if let Some(resolver) = &self.metadata {
            if !outcome.cancelled {
                let pending: Vec<Doi> = created
                    .into_iter()
                    .filter(|doi| results.is_incomplete(doi))
                    .collect();
                self.enrich(resolver, pending, results, &mut outcome).await;
            }
        }

        tracing::info!(
            target = %outcome.target,
            sightings = outcome.sightings,
            inserted = outcome.inserted,
            updated = outcome.updated,
            failed_providers = outcome.failures.len(),
            "Target aggregated"
        );

        outcome
    }

    /// Harvest and merge one target
    pub async fn aggregate(&self, target: &Doi, results: &ResultSet) -> AggregateOutcome {
        let harvest = self.harvest(target).await;
        self.merge(harvest, results).await
    }

    async fn enrich(
        &self,
        resolver: &MetadataResolver,
        pending: Vec<Doi>,
        results: &ResultSet,
        outcome: &mut AggregateOutcome,
    ) {
        if pending.is_empty() {
            return;
        }
        tracing::debug!(target = %outcome.target, pending = pending.len(), "Resolving metadata");

        let mut lookups = stream::iter(pending)
            .map(|doi| async move {
                let result = resolver.resolve(&doi).await;
                (doi, result)
            })
            .buffered(self.metadata_concurrency);

        while let Some((doi, result)) = lookups.next().await {
            match result {
                Ok(metadata) => {
                    results.fill_metadata(&doi, &metadata);
                }
                Err(SourceError::Cancelled) => outcome.cancelled = true,
                Err(e) => {
                    outcome.metadata_misses += 1;
                    tracing::debug!(doi = %doi, "{}", e);
                }
            }
        }
    }
}

async fn collect_citers(
    provider: &dyn Source,
    target: &Doi,
) -> (Vec<CitingRecord>, Option<SourceError>) {
    let mut records = Vec::new();
    let mut citers = provider.fetch_citers(target);

    while let Some(item) = citers.next().await {
        match item {
            Ok(record) => records.push(record),
            Err(error) => return (records, Some(error)),
        }
    }

    (records, None)
}
