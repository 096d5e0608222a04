use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use who_cited::config::{find_config_file, get_config, load_config, Config, LoggingConfig};
use who_cited::io::{read_dois, resolve_output_path, write_csv};
use who_cited::pipeline::{Pipeline, PipelineInput, RunOutcome};
use who_cited::sources::SourceRegistry;
use who_cited::ui::{summary_lines, summary_table, ProgressObserver};
use who_cited::utils::{is_journal_id, normalize_doi, HttpClient};

/// who-cited - Find every work that cites your papers
#[derive(Parser, Debug)]
#[command(name = "who-cited")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Find the works citing a list of DOIs or a journal's articles, merged across OpenAlex, OpenCitations and Crossref",
    long_about = None
)]
struct Cli {
    /// CSV file of DOIs, a single DOI, or a Crossref journal id (e.g. J297249)
    #[arg(required_unless_present = "print_config")]
    input: Option<String>,

    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write results to this file instead of a timestamped one
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Preferred directory for the timestamped results file
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Targets queried at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum citing works fetched per provider per target
    #[arg(long)]
    max_results: Option<usize>,

    /// Citation providers in query order (comma separated)
    #[arg(long, value_delimiter = ',')]
    providers: Option<Vec<String>>,

    /// Contact email for provider polite pools
    #[arg(long)]
    mailto: Option<String>,

    /// Skip Crossref lookups for records missing title/authors/year
    #[arg(long)]
    no_metadata: bool,

    /// Add a column listing which input DOIs each citing work cites
    #[arg(long)]
    include_targets: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let mut config = if let Some(config_path) = &cli.config {
        load_config(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        load_config(&config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else {
        get_config().context("Failed to read configuration from environment")?
    };
    apply_overrides(&cli, &mut config);

    init_tracing(&cli, &config.logging);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let Some(raw_input) = cli.input.as_deref() else {
        bail!("No input given");
    };
    let input = parse_input(raw_input)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current target");
            signal_token.cancel();
        }
    });

    let http = HttpClient::from_config(&config.http)?;
    let registry = SourceRegistry::from_config(&config, http, cancel.clone())?;
    tracing::info!(
        providers = ?registry.ids().collect::<Vec<_>>(),
        "Providers configured"
    );

    let progress = Arc::new(ProgressObserver::new(cli.quiet));
    let pipeline =
        Pipeline::new(&registry, &config.pipeline, cancel).with_observer(progress.clone());
    let report = pipeline.run(input).await;

    if !cli.quiet {
        if !report.target_outcomes.is_empty() {
            println!("{}", summary_table(&report));
        }
        for line in summary_lines(&report) {
            println!("{}", line);
        }
    }

    if !matches!(report.outcome, RunOutcome::Failed(_)) {
        let path = resolve_output_path(
            cli.output.as_deref(),
            config.output.directory.as_deref(),
            chrono::Local::now(),
        );
        write_csv(&path, &report.records, config.output.include_targets)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            println!("Results saved to {}", path.display());
        }
    }

    if report.is_failure() {
        match report.outcome {
            RunOutcome::Failed(error) => bail!("Run failed: {}", error),
            _ => bail!(
                "No citing works found and {} provider queries failed",
                report.failures.len()
            ),
        }
    }

    Ok(())
}

/// CLI flags take precedence over file and environment settings
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(concurrency) = cli.concurrency {
        config.pipeline.concurrency = concurrency.max(1);
    }
    if let Some(max_results) = cli.max_results {
        config.pipeline.max_results_per_target = max_results;
    }
    if let Some(providers) = &cli.providers {
        config.providers.enabled = providers
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }
    if let Some(mailto) = &cli.mailto {
        config.http.mailto = Some(mailto.clone());
    }
    if cli.no_metadata {
        config.pipeline.enrich_metadata = false;
    }
    if cli.include_targets {
        config.output.include_targets = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = Some(dir.clone());
    }
    if cli.log_json {
        config.logging.format = Some("json".to_string());
    }
}

fn init_tracing(cli: &Cli, logging: &LoggingConfig) {
    let log_level = match cli.verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("who_cited={}", env_filter)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.as_deref() == Some("json") {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Journal id, CSV file, or a single DOI, in that order
fn parse_input(raw: &str) -> Result<PipelineInput> {
    let trimmed = raw.trim();

    if is_journal_id(trimmed) {
        return Ok(PipelineInput::Journal(trimmed.to_string()));
    }

    let path = Path::new(trimmed);
    if path.is_file() {
        let dois = read_dois(path).with_context(|| format!("Failed to read {}", path.display()))?;
        if dois.is_empty() {
            bail!("No DOIs found in {}", path.display());
        }
        tracing::info!(count = dois.len(), file = %path.display(), "DOIs read");
        return Ok(PipelineInput::Dois(dois));
    }

    if normalize_doi(trimmed).is_ok() {
        return Ok(PipelineInput::Dois(vec![trimmed.to_string()]));
    }

    bail!(
        "'{}' is not a file, a DOI, or a journal id (J followed by six digits)",
        trimmed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "who-cited",
            "J297249",
            "--providers",
            "opencitations,openalex",
            "--concurrency",
            "0",
            "--no-metadata",
        ])
        .unwrap();

        let mut config = Config::default();
        apply_overrides(&cli, &mut config);

        assert_eq!(config.providers.enabled, vec!["opencitations", "openalex"]);
        assert_eq!(config.pipeline.concurrency, 1);
        assert!(!config.pipeline.enrich_metadata);
    }

    #[test]
    fn test_input_required_unless_printing_config() {
        assert!(Cli::try_parse_from(["who-cited"]).is_err());
        assert!(Cli::try_parse_from(["who-cited", "--print-config"]).is_ok());
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(
            parse_input("j297249").unwrap(),
            PipelineInput::Journal("j297249".to_string())
        );
        assert_eq!(
            parse_input("https://doi.org/10.1/a").unwrap(),
            PipelineInput::Dois(vec!["https://doi.org/10.1/a".to_string()])
        );
        assert!(parse_input("missing-file.csv").is_err());
    }
}
