//! Terminal output: run progress and the final summary.

use std::io::IsTerminal;
use std::time::Duration;

use comfy_table::{Attribute, Cell, Color, Table};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::pipeline::{PipelineObserver, PipelineState, RunOutcome, RunReport, TargetOutcome};

/// Check if stderr is a terminal.
pub fn is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Progress bar driven by pipeline events
///
/// Starts as a spinner while targets are resolved, becomes a bar over the
/// targets once they are known, and is hidden entirely when `quiet` is set
/// or stderr is not a terminal.
pub struct ProgressObserver {
    pb: ProgressBar,
}

impl ProgressObserver {
    pub fn new(quiet: bool) -> Self {
        let pb = ProgressBar::new_spinner();
        if quiet || !is_terminal() {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        Self { pb }
    }

    /// Print a line above the bar without tearing it
    fn println(&self, line: impl AsRef<str>) {
        self.pb.println(line);
    }
}

impl PipelineObserver for ProgressObserver {
    fn on_state(&self, state: PipelineState) {
        match state {
            PipelineState::Resolving => self.pb.set_message("Resolving targets"),
            PipelineState::TargetIteration => self.pb.set_message("Querying providers"),
            PipelineState::Aggregating => {}
            PipelineState::Done => self.pb.finish_with_message("✓ Done"),
            PipelineState::Failed => self.pb.abandon_with_message("✗ Failed"),
            PipelineState::Cancelled => self.pb.abandon_with_message("✗ Cancelled"),
        }
    }

    fn on_targets(&self, count: usize) {
        self.pb.set_length(count as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.cyan} {wide_bar:.cyan/blue} {pos}/{len} {msg}",
        ) {
            self.pb
                .set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ").progress_chars("█▉▊▋▌▍▎▏  "));
        }
    }

    fn on_target_done(&self, outcome: &TargetOutcome) {
        self.pb.inc(1);
        self.pb.set_message(outcome.target.to_string());
        if outcome.is_degraded() {
            let providers: Vec<&str> = outcome.failed_providers.iter().map(|p| p.name()).collect();
            self.println(format!(
                "⚠ {}: {} failed",
                outcome.target,
                providers.join(", ")
            ));
        }
    }
}

/// Per-target summary of a run
pub fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Target", "Citers", "New", "Updated", "Failed providers"]);

    for outcome in &report.target_outcomes {
        let failed: Vec<&str> = outcome.failed_providers.iter().map(|p| p.name()).collect();
        let failed_cell = if failed.is_empty() {
            Cell::new("")
        } else {
            Cell::new(failed.join(", ")).fg(Color::Red)
        };

        table.add_row(vec![
            Cell::new(outcome.target.to_string()).add_attribute(Attribute::Bold),
            Cell::new(outcome.sightings),
            Cell::new(outcome.inserted),
            Cell::new(outcome.updated),
            failed_cell,
        ]);
    }

    table
}

/// One-paragraph wrap-up printed after the table
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} targets, {} citing works",
        report.targets.len(),
        report.records.len()
    )];

    let degraded = report.degraded_targets();
    if !degraded.is_empty() {
        lines.push(format!("{} degraded targets", degraded.len()));
    }
    for invalid in &report.invalid_inputs {
        lines.push(format!("Skipped invalid input {:?}: {}", invalid.input, invalid.error));
    }
    match &report.outcome {
        RunOutcome::Done => {}
        RunOutcome::Failed(error) => lines.push(format!("Run failed: {}", error)),
        RunOutcome::Cancelled => lines.push(format!(
            "Run cancelled after {} of {} targets",
            report.target_outcomes.len(),
            report.targets.len()
        )),
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Doi, ProviderKind};

    fn degraded() -> TargetOutcome {
        TargetOutcome {
            target: Doi::parse("10.1/a").unwrap(),
            sightings: 2,
            inserted: 2,
            updated: 0,
            failed_providers: vec![ProviderKind::OpenAlex],
            metadata_misses: 0,
        }
    }

    #[test]
    fn test_quiet_observer_reports_degraded_target() {
        let observer = ProgressObserver::new(true);
        observer.on_targets(1);
        observer.on_target_done(&degraded());
        observer.on_state(PipelineState::Done);

        assert_eq!(observer.pb.position(), 1);
        assert!(observer.pb.is_finished());
    }

    #[test]
    fn test_summary_lists_failed_providers() {
        let report = RunReport {
            outcome: RunOutcome::Done,
            records: Vec::new(),
            targets: vec![Doi::parse("10.1/a").unwrap()],
            invalid_inputs: Vec::new(),
            target_outcomes: vec![degraded()],
            failures: Vec::new(),
        };

        let table = summary_table(&report).to_string();
        assert!(table.contains("10.1/a"));
        assert!(table.contains("OpenAlex"));
        assert!(summary_lines(&report).contains(&"1 degraded targets".to_string()));
    }
}
