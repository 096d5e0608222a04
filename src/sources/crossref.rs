//! CrossRef metadata and journal listing source.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Doi, JournalId, Metadata, ProviderKind};
use crate::sources::{encode_doi_path, ListingPage, Source, SourceCapabilities, SourceError};
use crate::utils::{with_retry, HttpClient, RequestPolicy};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";
const CROSSREF_DEPOSITOR_REPORT: &str = "https://data.crossref.org/depositorreport";

/// Date fields consulted for the publication year, in order of preference
const YEAR_FIELDS: [&str; 4] = ["issued", "published-print", "published-online", "created"];

/// CrossRef source
///
/// Uses the CrossRef REST API for DOI metadata and the depositor report
/// service for journal article listings.
#[derive(Debug)]
pub struct CrossRefSource {
    http: HttpClient,
    policy: RequestPolicy,
    base_url: String,
    depositor_report_url: String,
}

impl CrossRefSource {
    pub fn new(http: HttpClient, policy: RequestPolicy) -> Self {
        Self {
            http,
            policy,
            base_url: CROSSREF_API_BASE.to_string(),
            depositor_report_url: CROSSREF_DEPOSITOR_REPORT.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_depositor_report_url(mut self, url: &str) -> Self {
        self.depositor_report_url = url.to_string();
        self
    }
}

#[async_trait]
impl Source for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::CrossRef
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::METADATA | SourceCapabilities::JOURNAL_LISTING
    }

    async fn lookup_metadata(&self, doi: &Doi) -> Result<Option<Metadata>, SourceError> {
        let url = format!("{}/works/{}", self.base_url, encode_doi_path(doi));

        let response = with_retry(self.id(), &self.policy, || {
            self.http.get_json::<CRResponse>(&url, &[])
        })
        .await?;

        Ok(response.map(|r| r.message.into_metadata()))
    }

    /// The depositor report is a single plain-text document, so there is
    /// never a next page.
    async fn fetch_listing_page(
        &self,
        journal: &JournalId,
        _cursor: Option<&str>,
    ) -> Result<ListingPage, SourceError> {
        let query = [("pubid", journal.as_str().to_string())];

        let text = with_retry(self.id(), &self.policy, || {
            self.http.get_text(&self.depositor_report_url, &query)
        })
        .await?
        .ok_or_else(|| SourceError::NotFound(format!("Journal {} not found", journal)))?;

        let dois = parse_depositor_report(&text);
        tracing::debug!(journal = %journal, articles = dois.len(), "Depositor report parsed");

        Ok(ListingPage::last(dois))
    }
}

/// One DOI per line in the first whitespace-separated column; the header
/// row (starting with "DOI") and unparseable lines are skipped.
fn parse_depositor_report(text: &str) -> Vec<Doi> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.to_uppercase().starts_with("DOI"))
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|first| Doi::parse(first).ok())
        .collect()
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: CRWork,
}

#[derive(Debug, Deserialize)]
struct CRWork {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(flatten)]
    dates: std::collections::HashMap<String, serde_json::Value>,
}

impl CRWork {
    fn into_metadata(self) -> Metadata {
        let year = YEAR_FIELDS
            .iter()
            .find_map(|field| self.dates.get(*field).and_then(first_year));

        Metadata {
            title: self
                .title
                .into_iter()
                .map(|t| t.trim().to_string())
                .find(|t| !t.is_empty()),
            authors: self
                .author
                .into_iter()
                .filter_map(CRAuthor::full_name)
                .collect(),
            year,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

impl CRAuthor {
    /// "Given Family", falling back to whichever part exists, then `name`
    fn full_name(self) -> Option<String> {
        let given = self.given.filter(|s| !s.trim().is_empty());
        let family = self.family.filter(|s| !s.trim().is_empty());
        let name = match (given, family) {
            (Some(given), Some(family)) => format!("{} {}", given.trim(), family.trim()),
            (None, Some(family)) => family,
            (Some(given), None) => given,
            (None, None) => self.name?,
        };
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// `{"date-parts": [[2020, 5, 1]]}` -> 2020
fn first_year(date: &serde_json::Value) -> Option<i32> {
    date.get("date-parts")?
        .get(0)?
        .get(0)?
        .as_i64()
        .and_then(|year| i32::try_from(year).ok())
        .filter(|year| *year > 0)
}
