//! Registry for managing provider plugins.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{CrossRefSource, OpenAlexSource, OpenCitationsSource, Source, SourceError};
use crate::config::Config;
use crate::utils::{HttpClient, RequestPolicy, RetryConfig};

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const CITERS = 1 << 0;
        const JOURNAL_LISTING = 1 << 1;
        const METADATA = 1 << 2;
    }
}

/// Ordered registry of provider plugins
///
/// Unlike a lookup table, order matters here: citation providers are queried
/// and merged in registration order.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create a registry with no sources
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the configured providers
    ///
    /// Citation providers come from `providers.enabled` in order; Crossref is
    /// always registered for metadata and journal listings. Each provider
    /// gets its own quota so one provider's pacing never delays another.
    pub fn from_config(
        config: &Config,
        http: HttpClient,
        cancel: CancellationToken,
    ) -> Result<Self, SourceError> {
        let retry = RetryConfig::from(&config.retry);
        let policy = |min_interval_ms: u64| {
            RequestPolicy::new(
                retry,
                Duration::from_millis(min_interval_ms),
                cancel.clone(),
            )
        };
        let max_results = config.pipeline.max_results_per_target;
        let providers = &config.providers;

        let mut registry = Self::empty();

        for id in &providers.enabled {
            match id.trim().to_lowercase().as_str() {
                "openalex" => {
                    let mut source = OpenAlexSource::new(
                        http.clone(),
                        policy(providers.openalex.min_interval_ms),
                    )
                    .with_base_url(&providers.openalex.base_url)
                    .with_max_results(max_results);
                    if let Some(mailto) = &config.http.mailto {
                        source = source.with_mailto(mailto);
                    }
                    registry.register(Arc::new(source));
                }
                "opencitations" => {
                    let source = OpenCitationsSource::new(
                        http.clone(),
                        policy(providers.opencitations.min_interval_ms),
                    )
                    .with_base_url(&providers.opencitations.base_url)
                    .with_max_results(max_results);
                    registry.register(Arc::new(source));
                }
                other => {
                    return Err(SourceError::NotFound(format!(
                        "Unknown citation provider '{}'",
                        other
                    )));
                }
            }
        }

        if registry.citation_sources().is_empty() {
            return Err(SourceError::NotFound(
                "No citation providers enabled".to_string(),
            ));
        }

        let crossref = CrossRefSource::new(http, policy(providers.crossref.min_interval_ms))
            .with_base_url(&providers.crossref.base_url)
            .with_depositor_report_url(&providers.crossref.depositor_report_url);
        registry.register(Arc::new(crossref));

        Ok(registry)
    }

    /// Register a source; a source with the same ID is replaced in place
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(index) => self.sources[index] = source,
            None => self.sources.push(source),
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Get all registered sources in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Get sources that support a specific capability, in registration order
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .cloned()
            .collect()
    }

    /// Sources that can list citing works
    pub fn citation_sources(&self) -> Vec<Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::CITERS)
    }

    /// Sources that can resolve metadata
    pub fn metadata_sources(&self) -> Vec<Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::METADATA)
    }

    /// The first source able to list journal articles
    pub fn listing_source(&self) -> Option<Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::JOURNAL_LISTING)
            .into_iter()
            .next()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
