//! OpenAlex citation source.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::Stream;
use serde::Deserialize;

use crate::models::{CitingRecord, Doi, ProviderKind};
use crate::sources::{encode_doi_path, CiterStream, Source, SourceCapabilities, SourceError};
use crate::utils::{with_retry, HttpClient, RequestPolicy};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Results per cursor page (the API maximum)
const PER_PAGE: usize = 200;

/// Hard stop on cursor pages per target
const MAX_PAGES: usize = 50;

const SELECT_FIELDS: &str = "doi,title,authorships,publication_year";

/// OpenAlex citation source
///
/// Resolves the target DOI to an OpenAlex work, then walks the
/// `cites:<work id>` filter with cursor pagination.
#[derive(Debug)]
pub struct OpenAlexSource {
    http: HttpClient,
    policy: RequestPolicy,
    base_url: String,
    mailto: Option<String>,
    max_results: usize,
}

impl OpenAlexSource {
    pub fn new(http: HttpClient, policy: RequestPolicy) -> Self {
        Self {
            http,
            policy,
            base_url: OPENALEX_API_BASE.to_string(),
            mailto: None,
            max_results: usize::MAX,
        }
    }

    /// Point at a different API root (used by tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Send a contact address to join the polite pool
    pub fn with_mailto(mut self, mailto: &str) -> Self {
        self.mailto = Some(mailto.to_string());
        self
    }

    /// Stop after this many citing works per target
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    fn base_query(&self) -> Vec<(&'static str, String)> {
        self.mailto
            .iter()
            .map(|mailto| ("mailto", mailto.clone()))
            .collect()
    }

    fn citers<'a>(
        &'a self,
        target: &'a Doi,
    ) -> impl Stream<Item = Result<CitingRecord, SourceError>> + Send + 'a {
        try_stream! {
            let work_url = format!("{}/works/doi:{}", self.base_url, encode_doi_path(target));
            let base_query = self.base_query();
            let work = with_retry(self.id(), &self.policy, || {
                self.http.get_json::<OAWork>(&work_url, &base_query)
            })
            .await?;

            let work_id = match work {
                Some(work) if work.cited_by_count.unwrap_or(0) > 0 => work.short_id(),
                Some(_) => {
                    tracing::debug!(target = %target, "OpenAlex reports no citations");
                    None
                }
                None => {
                    tracing::debug!(target = %target, "Target unknown to OpenAlex");
                    None
                }
            };

            if let Some(work_id) = work_id {
                let works_url = format!("{}/works", self.base_url);
                let mut cursor = Some("*".to_string());
                let mut pages = 0;
                let mut yielded = 0;

                while let Some(current) = cursor.take() {
                    if pages >= MAX_PAGES || yielded >= self.max_results {
                        break;
                    }

                    let mut query = base_query.clone();
                    query.push(("filter", format!("cites:{}", work_id)));
                    query.push(("per-page", PER_PAGE.to_string()));
                    query.push(("cursor", current.clone()));
                    query.push(("select", SELECT_FIELDS.to_string()));

                    let page = with_retry(self.id(), &self.policy, || {
                        self.http.get_json::<OAWorksPage>(&works_url, &query)
                    })
                    .await?;
                    let Some(page) = page else {
                        break;
                    };
                    pages += 1;

                    tracing::trace!(
                        target = %target,
                        page = pages,
                        results = page.results.len(),
                        "OpenAlex citation page"
                    );

                    for work in page.results {
                        if yielded >= self.max_results {
                            break;
                        }
                        if let Some(record) = work.into_record() {
                            yielded += 1;
                            yield record;
                        }
                    }

                    cursor = page
                        .meta
                        .and_then(|meta| meta.next_cursor)
                        .filter(|next| !next.is_empty() && *next != current);
                }
            }
        }
    }
}

#[async_trait]
impl Source for OpenAlexSource {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAlex
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::CITERS
    }

    fn fetch_citers<'a>(&'a self, target: &'a Doi) -> CiterStream<'a> {
        Box::pin(self.citers(target))
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct OAWork {
    id: Option<String>,
    cited_by_count: Option<u64>,
}

impl OAWork {
    /// `https://openalex.org/W123` -> `W123`
    fn short_id(&self) -> Option<String> {
        self.id
            .as_deref()
            .and_then(|id| id.rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct OAWorksPage {
    #[serde(default)]
    results: Vec<OACitingWork>,
    meta: Option<OAMeta>,
}

#[derive(Debug, Deserialize)]
struct OAMeta {
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OACitingWork {
    doi: Option<String>,
    title: Option<String>,
    publication_year: Option<i32>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
}

impl OACitingWork {
    fn into_record(self) -> Option<CitingRecord> {
        let doi = match self.doi.as_deref().map(Doi::parse) {
            Some(Ok(doi)) => doi,
            Some(Err(e)) => {
                tracing::debug!("Skipping OpenAlex work with unusable DOI: {}", e);
                return None;
            }
            None => return None,
        };

        let authors = self
            .authorships
            .into_iter()
            .filter_map(|a| a.author.and_then(|author| author.display_name));

        let mut record = CitingRecord::new(doi, ProviderKind::OpenAlex).authors(authors);
        if let Some(title) = self.title {
            record = record.title(title);
        }
        if let Some(year) = self.publication_year {
            record = record.year(year);
        }
        Some(record)
    }
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: Option<OAAuthor>,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}
