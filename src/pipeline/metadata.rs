//! Bibliographic metadata lookup for bare citation links.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{Doi, Metadata};
use crate::sources::{Source, SourceError};

/// Resolves a DOI to title, authors and year
///
/// Sources are consulted in order until the metadata is complete. Found
/// metadata and definitive misses are memoized for the lifetime of the
/// resolver; lookups that failed with an error are not.
#[derive(Debug)]
pub struct MetadataResolver {
    sources: Vec<Arc<dyn Source>>,
    cache: Mutex<HashMap<Doi, Option<Metadata>>>,
}

impl MetadataResolver {
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Self {
        Self {
            sources,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Look up metadata for `doi`
    ///
    /// Fails with `MetadataUnavailable` when no source knows the DOI or every
    /// source errored, and with `Cancelled` if a stop was requested.
    pub async fn resolve(&self, doi: &Doi) -> Result<Metadata, SourceError> {
        if let Some(cached) = self.cached(doi) {
            return cached.ok_or_else(|| SourceError::MetadataUnavailable(doi.to_string()));
        }

        let mut found: Option<Metadata> = None;
        let mut definitive = true;

        for source in &self.sources {
            match source.lookup_metadata(doi).await {
                Ok(Some(metadata)) if !metadata.is_empty() => {
                    let merged = found.get_or_insert_with(Metadata::default);
                    merged.fill_from(&metadata);
                    if merged.is_complete() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
                Err(e) => {
                    definitive = false;
                    tracing::debug!(doi = %doi, source = source.id(), "Metadata lookup failed: {}", e);
                }
            }
        }

        if found.is_some() || definitive {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(doi.clone(), found.clone());
        }

        found.ok_or_else(|| SourceError::MetadataUnavailable(doi.to_string()))
    }

    fn cached(&self, doi: &Doi) -> Option<Option<Metadata>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(doi)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockSource, SourceCapabilities};

    fn doi(s: &str) -> Doi {
        Doi::parse(s).unwrap()
    }

    fn complete() -> Metadata {
        Metadata {
            title: Some("Bar".to_string()),
            authors: vec!["Ann Author".to_string()],
            year: Some(2019),
        }
    }

    #[tokio::test]
    async fn test_resolve_memoizes_hits_and_misses() {
        let source = Arc::new(
            MockSource::new("registry")
                .with_capabilities(SourceCapabilities::METADATA)
                .with_metadata("10.2/y", complete()),
        );
        let resolver = MetadataResolver::new(vec![source.clone()]);

        assert_eq!(resolver.resolve(&doi("10.2/y")).await.unwrap(), complete());
        assert_eq!(resolver.resolve(&doi("10.2/y")).await.unwrap(), complete());

        let miss = resolver.resolve(&doi("10.2/none")).await;
        assert!(matches!(miss, Err(SourceError::MetadataUnavailable(_))));
        let _ = resolver.resolve(&doi("10.2/none")).await;

        assert_eq!(source.metadata_calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_memoized() {
        let source = Arc::new(
            MockSource::new("registry")
                .with_capabilities(SourceCapabilities::METADATA)
                .fail_metadata("10.2/y"),
        );
        let resolver = MetadataResolver::new(vec![source.clone()]);

        assert!(matches!(
            resolver.resolve(&doi("10.2/y")).await,
            Err(SourceError::MetadataUnavailable(_))
        ));
        let _ = resolver.resolve(&doi("10.2/y")).await;
        assert_eq!(source.metadata_calls(), 2);
    }

    #[tokio::test]
    async fn test_later_sources_fill_gaps() {
        let partial = MockSource::new("first")
            .with_capabilities(SourceCapabilities::METADATA)
            .with_metadata(
                "10.2/y",
                Metadata {
                    title: Some("First".to_string()),
                    ..Metadata::default()
                },
            );
        let fuller = MockSource::new("second")
            .with_capabilities(SourceCapabilities::METADATA)
            .with_metadata("10.2/y", complete());
        let resolver = MetadataResolver::new(vec![Arc::new(partial), Arc::new(fuller)]);

        let metadata = resolver.resolve(&doi("10.2/y")).await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("First"));
        assert_eq!(metadata.year, Some(2019));
    }
}
