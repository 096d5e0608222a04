//! Normalized identifiers: DOIs and Crossref journal codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::sources::SourceError;
use crate::utils::{normalize_doi, validate_journal_id};

/// A normalized Digital Object Identifier
///
/// Construction always goes through [`Doi::parse`], so two `Doi` values are
/// equal exactly when they name the same work (case-folded, resolver prefix
/// stripped).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Doi(String);

impl Doi {
    /// Parse and normalize a DOI, failing with `InvalidIdentifier` if malformed
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        normalize_doi(raw)
            .map(Doi)
            .map_err(|e| SourceError::InvalidIdentifier(e.to_string()))
    }

    /// The normalized DOI string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DOI as a resolver URL
    pub fn url(&self) -> String {
        format!("https://doi.org/{}", self.0)
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Doi {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Doi::parse(s)
    }
}

impl TryFrom<String> for Doi {
    type Error = SourceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Doi::parse(&value)
    }
}

impl From<Doi> for String {
    fn from(doi: Doi) -> Self {
        doi.0
    }
}

impl AsRef<str> for Doi {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A Crossref depositor journal code, e.g. `J297249`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalId(String);

impl JournalId {
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        validate_journal_id(raw)
            .map(JournalId)
            .map_err(|e| SourceError::InvalidIdentifier(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JournalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JournalId {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JournalId::parse(s)
    }
}
