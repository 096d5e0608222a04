//! Identifier validation for DOIs and journal codes.
//!
//! DOIs arrive in many shapes: bare, `doi:`-prefixed, as resolver URLs, and
//! sometimes URL-encoded when they were scraped from links. Everything is
//! reduced to one canonical lower-case form so that the same work reported by
//! two providers compares equal.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Validation error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid DOI format: {0}")]
    InvalidDoi(String),

    #[error("Invalid journal identifier: {0}")]
    InvalidJournalId(String),
}

/// Resolver prefixes stripped before validation (matched case-insensitively).
const DOI_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

fn doi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^10\.\d+(\.\d+)*/\S+$").expect("DOI pattern is a valid regex")
    })
}

fn journal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[Jj]\d{6}$").expect("journal pattern is a valid regex")
    })
}

/// Validate and normalize a DOI
///
/// Returns the DOI lower-cased with any resolver prefix removed, e.g.
/// `https://doi.org/10.1038/Nature12345` becomes `10.1038/nature12345`.
///
/// Percent-decoding is applied only to resolver URLs and to inputs whose
/// slash is itself encoded, so normalizing an already normalized DOI
/// returns it unchanged.
pub fn normalize_doi(raw: &str) -> Result<String, ValidationError> {
    let decoded = if is_url_encoded(raw) {
        urlencoding::decode(raw)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| raw.to_string())
    } else {
        raw.to_string()
    };
    let trimmed = decoded.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::InvalidDoi("empty DOI".to_string()));
    }

    let lower = trimmed.to_lowercase();
    let stripped = DOI_PREFIXES
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(&lower)
        .trim();

    if !doi_pattern().is_match(stripped) {
        return Err(ValidationError::InvalidDoi(raw.trim().to_string()));
    }

    Ok(stripped.to_string())
}

fn is_url_encoded(raw: &str) -> bool {
    let lower = raw.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || !raw.contains('/')
}

/// Validate a Crossref journal identifier (`J` followed by six digits)
///
/// Returns the identifier with an upper-case prefix.
pub fn validate_journal_id(raw: &str) -> Result<String, ValidationError> {
    let id = raw.trim();
    if !journal_pattern().is_match(id) {
        return Err(ValidationError::InvalidJournalId(id.to_string()));
    }
    Ok(id.to_uppercase())
}

/// Check whether a string looks like a journal identifier
pub fn is_journal_id(raw: &str) -> bool {
    journal_pattern().is_match(raw.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi_valid() {
        assert_eq!(normalize_doi("10.1234/abc123").unwrap(), "10.1234/abc123");
        assert_eq!(
            normalize_doi("10.1038/Nature12345").unwrap(),
            "10.1038/nature12345"
        );
        assert_eq!(normalize_doi("10.1/A").unwrap(), "10.1/a");
        assert_eq!(
            normalize_doi("10.1000.10/xyz").unwrap(),
            "10.1000.10/xyz"
        );
    }

    #[test]
    fn test_normalize_doi_strips_prefixes() {
        assert_eq!(
            normalize_doi("doi:10.1234/abc123").unwrap(),
            "10.1234/abc123"
        );
        assert_eq!(
            normalize_doi("https://doi.org/10.1234/ABC").unwrap(),
            "10.1234/abc"
        );
        assert_eq!(
            normalize_doi("HTTP://DX.DOI.ORG/10.1234/abc").unwrap(),
            "10.1234/abc"
        );
        assert_eq!(
            normalize_doi("  https://dx.doi.org/10.5555/x  ").unwrap(),
            "10.5555/x"
        );
    }

    #[test]
    fn test_normalize_doi_url_decoded() {
        assert_eq!(
            normalize_doi("10.1002%2F(SICI)1097").unwrap(),
            "10.1002/(sici)1097"
        );
    }

    #[test]
    fn test_normalize_doi_is_idempotent() {
        assert_eq!(normalize_doi("10.1/a%25b").unwrap(), "10.1/a%25b");

        let once = normalize_doi("https://doi.org/10.1/a%2525b").unwrap();
        assert_eq!(once, "10.1/a%25b");
        assert_eq!(normalize_doi(&once).unwrap(), once);
    }

    #[test]
    fn test_normalize_doi_invalid() {
        assert!(normalize_doi("").is_err());
        assert!(normalize_doi("   ").is_err());
        assert!(normalize_doi("11.1234/abc").is_err());
        assert!(normalize_doi("10.1234").is_err());
        assert!(normalize_doi("10.abcd/xyz").is_err());
        assert!(normalize_doi("10.1234/has space").is_err());
        assert!(normalize_doi("DOI").is_err());
    }

    #[test]
    fn test_validate_journal_id() {
        assert_eq!(validate_journal_id("J297249").unwrap(), "J297249");
        assert_eq!(validate_journal_id(" j645505 ").unwrap(), "J645505");
        assert!(validate_journal_id("J29724").is_err());
        assert!(validate_journal_id("J2972490").is_err());
        assert!(validate_journal_id("X297249").is_err());
        assert!(validate_journal_id("297249").is_err());
        assert!(is_journal_id("J000001"));
        assert!(!is_journal_id("dois.csv"));
    }
}
