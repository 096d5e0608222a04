//! Citing-work records as reported by providers and as merged for export.

use serde::{Deserialize, Serialize};

use super::Doi;

/// The provider a record was obtained from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAlex,
    OpenCitations,
    CrossRef,
    #[serde(untagged)]
    Other(String),
}

impl ProviderKind {
    /// Returns the display name of the provider
    pub fn name(&self) -> &str {
        match self {
            ProviderKind::OpenAlex => "OpenAlex",
            ProviderKind::OpenCitations => "OpenCitations",
            ProviderKind::CrossRef => "CrossRef",
            ProviderKind::Other(s) => s,
        }
    }

    /// Returns the provider identifier used in configuration
    pub fn id(&self) -> &str {
        match self {
            ProviderKind::OpenAlex => "openalex",
            ProviderKind::OpenCitations => "opencitations",
            ProviderKind::CrossRef => "crossref",
            ProviderKind::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Bibliographic fields of a work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
}

impl Metadata {
    /// All of title, authors and year are present
    pub fn is_complete(&self) -> bool {
        self.title.is_some() && !self.authors.is_empty() && self.year.is_some()
    }

    /// None of the fields are present
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.authors.is_empty() && self.year.is_none()
    }

    /// Fill every missing field from `other`, keeping fields already present.
    ///
    /// Returns true if anything changed.
    pub fn fill_from(&mut self, other: &Metadata) -> bool {
        let mut changed = false;
        if self.title.is_none() {
            if let Some(title) = &other.title {
                self.title = Some(title.clone());
                changed = true;
            }
        }
        if self.authors.is_empty() && !other.authors.is_empty() {
            self.authors = other.authors.clone();
            changed = true;
        }
        if self.year.is_none() && other.year.is_some() {
            self.year = other.year;
            changed = true;
        }
        changed
    }
}

/// One citing work as reported by one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitingRecord {
    pub doi: Doi,
    pub metadata: Metadata,
    pub source_provider: ProviderKind,
}

impl CitingRecord {
    /// Create a bare citation link with no bibliographic fields
    pub fn new(doi: Doi, source_provider: ProviderKind) -> Self {
        Self {
            doi,
            metadata: Metadata::default(),
            source_provider,
        }
    }

    /// Set the title; blank titles are treated as absent
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = clean_text(title.into());
        self
    }

    /// Set the authors; blank names are dropped
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.authors = authors
            .into_iter()
            .filter_map(|a| clean_text(a.into()))
            .collect();
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.metadata.year = Some(year);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.metadata.is_complete()
    }
}

/// The deduplicated, merged view of one citing work across providers and targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    pub doi: Doi,
    pub metadata: Metadata,

    /// Providers that reported this work, in first-seen order
    pub providers: Vec<ProviderKind>,

    /// Target works this work cites, in first-seen order
    pub cites: Vec<Doi>,
}

impl AggregatedRecord {
    /// Create from the first sighting of a citing work
    pub fn from_sighting(record: CitingRecord, target: &Doi) -> Self {
        Self {
            doi: record.doi,
            metadata: record.metadata,
            providers: vec![record.source_provider],
            cites: vec![target.clone()],
        }
    }

    /// Merge a later sighting of the same work.
    ///
    /// Missing fields are filled from the sighting; fields already present
    /// are never replaced. Returns true if the record changed.
    pub fn merge(&mut self, record: &CitingRecord, target: &Doi) -> bool {
        let mut changed = self.metadata.fill_from(&record.metadata);
        if !self.providers.contains(&record.source_provider) {
            self.providers.push(record.source_provider.clone());
            changed = true;
        }
        if !self.cites.contains(target) {
            self.cites.push(target.clone());
            changed = true;
        }
        changed
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.title.as_deref()
    }

    pub fn authors(&self) -> &[String] {
        &self.metadata.authors
    }

    pub fn year(&self) -> Option<i32> {
        self.metadata.year
    }

    /// Authors joined for display and export
    pub fn authors_joined(&self) -> String {
        self.metadata.authors.join("; ")
    }
}

fn clean_text(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == text.len() {
        Some(text)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doi(s: &str) -> Doi {
        Doi::parse(s).unwrap()
    }

    #[test]
    fn test_citing_record_builder() {
        let record = CitingRecord::new(doi("10.2/x"), ProviderKind::OpenAlex)
            .title("  Foo ")
            .authors(["Jane Doe", " ", "John Roe"])
            .year(2020);

        assert_eq!(record.metadata.title.as_deref(), Some("Foo"));
        assert_eq!(record.metadata.authors, vec!["Jane Doe", "John Roe"]);
        assert!(record.is_complete());

        let bare = CitingRecord::new(doi("10.2/y"), ProviderKind::OpenCitations).title("");
        assert!(bare.metadata.is_empty());
    }

    #[test]
    fn test_merge_never_overwrites() {
        let target_a = doi("10.1/a");
        let target_b = doi("10.1/b");
        let first = CitingRecord::new(doi("10.2/x"), ProviderKind::OpenAlex)
            .title("Foo")
            .year(2020);
        let mut merged = AggregatedRecord::from_sighting(first, &target_a);

        let later = CitingRecord::new(doi("10.2/x"), ProviderKind::OpenCitations)
            .title("Bar")
            .authors(["Ann Author"])
            .year(2019);
        assert!(merged.merge(&later, &target_b));

        assert_eq!(merged.title(), Some("Foo"));
        assert_eq!(merged.year(), Some(2020));
        assert_eq!(merged.authors(), ["Ann Author".to_string()]);
        assert_eq!(
            merged.providers,
            vec![ProviderKind::OpenAlex, ProviderKind::OpenCitations]
        );
        assert_eq!(merged.cites, vec![target_a, target_b.clone()]);

        // Same sighting again is a no-op
        assert!(!merged.merge(&later, &target_b));
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::OpenAlex.to_string(), "OpenAlex");
        assert_eq!(ProviderKind::OpenCitations.id(), "opencitations");
        assert_eq!(ProviderKind::Other("mock".into()).id(), "mock");
    }
}
