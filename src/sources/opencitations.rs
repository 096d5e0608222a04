//! OpenCitations (COCI) citation source.
//!
//! The index only carries citation links. Each record comes back with a DOI
//! and, when the link has a creation date, a year; titles and authors are
//! left for metadata enrichment.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::Stream;
use serde::Deserialize;

use crate::models::{CitingRecord, Doi, ProviderKind};
use crate::sources::{encode_doi_path, CiterStream, Source, SourceCapabilities, SourceError};
use crate::utils::{with_retry, HttpClient, RequestPolicy};

const OPENCITATIONS_API_BASE: &str = "https://opencitations.net/index/api/v1";

#[derive(Debug)]
pub struct OpenCitationsSource {
    http: HttpClient,
    policy: RequestPolicy,
    base_url: String,
    max_results: usize,
}

impl OpenCitationsSource {
    pub fn new(http: HttpClient, policy: RequestPolicy) -> Self {
        Self {
            http,
            policy,
            base_url: OPENCITATIONS_API_BASE.to_string(),
            max_results: usize::MAX,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    fn citers<'a>(
        &'a self,
        target: &'a Doi,
    ) -> impl Stream<Item = Result<CitingRecord, SourceError>> + Send + 'a {
        try_stream! {
            let url = format!("{}/citations/{}", self.base_url, encode_doi_path(target));
            let links = with_retry(self.id(), &self.policy, || {
                self.http.get_json::<Vec<OCLink>>(&url, &[])
            })
            .await?
            .unwrap_or_default();

            tracing::trace!(target = %target, links = links.len(), "OpenCitations links");

            let records = links
                .into_iter()
                .filter_map(OCLink::into_record)
                .take(self.max_results);
            for record in records {
                yield record;
            }
        }
    }
}

#[async_trait]
impl Source for OpenCitationsSource {
    fn id(&self) -> &str {
        "opencitations"
    }

    fn name(&self) -> &str {
        "OpenCitations"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenCitations
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::CITERS
    }

    fn fetch_citers<'a>(&'a self, target: &'a Doi) -> CiterStream<'a> {
        Box::pin(self.citers(target))
    }
}

#[derive(Debug, Deserialize)]
struct OCLink {
    #[serde(default)]
    citing: String,
    creation: Option<String>,
}

impl OCLink {
    fn into_record(self) -> Option<CitingRecord> {
        let Some(doi) = citing_doi(&self.citing) else {
            tracing::debug!(citing = %self.citing, "Skipping OpenCitations link without a DOI");
            return None;
        };

        let mut record = CitingRecord::new(doi, ProviderKind::OpenCitations);
        if let Some(year) = self.creation.as_deref().and_then(creation_year) {
            record = record.year(year);
        }
        Some(record)
    }
}

/// The citing field is a bare DOI in v1 and a space-separated list of
/// prefixed identifiers (`omid:br/... doi:10.x/y pmid:...`) in later versions.
fn citing_doi(citing: &str) -> Option<Doi> {
    citing.split_whitespace().find_map(|token| {
        let candidate = token.strip_prefix("doi:").unwrap_or(token);
        Doi::parse(candidate).ok()
    })
}

/// `2019-05-03` or `2019-05` or `2019` -> 2019
fn creation_year(creation: &str) -> Option<i32> {
    creation
        .get(..4)
        .and_then(|year| year.parse().ok())
        .filter(|year| *year > 0)
}
