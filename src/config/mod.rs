//! Configuration management.
//!
//! Settings come from an optional TOML file layered under environment
//! variables prefixed `WHO_CITED__` (double underscore separates sections,
//! e.g. `WHO_CITED__PIPELINE__CONCURRENCY=4`). Every field has a default, so
//! an empty or partial file is valid.

mod file_config;

pub use file_config::{find_config_file, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Contact email sent to providers for their polite pools
    #[serde(default = "default_mailto")]
    pub mailto: Option<String>,

    /// Overrides the generated user agent
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            mailto: default_mailto(),
            user_agent: None,
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_mailto() -> Option<String> {
    std::env::var("WHO_CITED_MAILTO").ok()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Retry settings shared by all providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Which providers to query, in order, and where they live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Citation providers in query order; earlier providers win field ties
    #[serde(default = "default_enabled")]
    pub enabled: Vec<String>,

    #[serde(default)]
    pub openalex: OpenAlexConfig,

    #[serde(default)]
    pub opencitations: OpenCitationsConfig,

    #[serde(default)]
    pub crossref: CrossRefConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            openalex: OpenAlexConfig::default(),
            opencitations: OpenCitationsConfig::default(),
            crossref: CrossRefConfig::default(),
        }
    }
}

fn default_enabled() -> Vec<String> {
    vec!["openalex".to_string(), "opencitations".to_string()]
}

fn default_min_interval() -> u64 {
    500
}

/// OpenAlex endpoint and pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAlexConfig {
    #[serde(default = "default_openalex_base")]
    pub base_url: String,

    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
}

impl Default for OpenAlexConfig {
    fn default() -> Self {
        Self {
            base_url: default_openalex_base(),
            min_interval_ms: default_min_interval(),
        }
    }
}

fn default_openalex_base() -> String {
    "https://api.openalex.org".to_string()
}

/// OpenCitations endpoint and pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenCitationsConfig {
    #[serde(default = "default_opencitations_base")]
    pub base_url: String,

    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
}

impl Default for OpenCitationsConfig {
    fn default() -> Self {
        Self {
            base_url: default_opencitations_base(),
            min_interval_ms: default_min_interval(),
        }
    }
}

fn default_opencitations_base() -> String {
    "https://opencitations.net/index/api/v1".to_string()
}

/// Crossref serves both metadata lookups and journal listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRefConfig {
    #[serde(default = "default_crossref_base")]
    pub base_url: String,

    #[serde(default = "default_depositor_report")]
    pub depositor_report_url: String,

    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            base_url: default_crossref_base(),
            depositor_report_url: default_depositor_report(),
            min_interval_ms: default_min_interval(),
        }
    }
}

fn default_crossref_base() -> String {
    "https://api.crossref.org".to_string()
}

fn default_depositor_report() -> String {
    "https://data.crossref.org/depositorreport".to_string()
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Upper bound on citers fetched per provider per target
    #[serde(default = "default_max_results")]
    pub max_results_per_target: usize,

    /// Targets whose provider queries may be in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Metadata lookups in flight at once for one target
    #[serde(default = "default_metadata_concurrency")]
    pub metadata_concurrency: usize,

    /// Look up title/authors/year for records that lack them
    #[serde(default = "default_true")]
    pub enrich_metadata: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_results_per_target: default_max_results(),
            concurrency: default_concurrency(),
            metadata_concurrency: default_metadata_concurrency(),
            enrich_metadata: true,
        }
    }
}

fn default_max_results() -> usize {
    10_000
}

fn default_concurrency() -> usize {
    2
}

fn default_metadata_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Export settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Preferred destination directory; the working directory is used if it is missing
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Add a column listing which input DOIs each row cites
    #[serde(default)]
    pub include_targets: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, anything else for plain text
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?
        .try_deserialize()
}

/// Load configuration from environment variables and defaults only
pub fn get_config() -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(environment())
        .build()?
        .try_deserialize()
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("WHO_CITED")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("providers.enabled")
}
