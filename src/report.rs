/*!
 * Reporting functionality for attrsnap
 *
 * Collects per-run counters and renders the end-of-run summary with the
 * tabled library for clean, consistent table rendering. Exclusions and
 * skips are successful outcomes and are counted apart from errors.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

/// Counters accumulated while a save or restore run walks its entries.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Records captured (save mode)
    pub captured: usize,
    /// Entries with at least one field written (restore mode)
    pub applied: usize,
    /// Entries inspected and already up to date (restore mode)
    pub unchanged: usize,
    /// Entries deliberately left alone (missing, kind mismatch, links)
    pub skipped: usize,
    /// Entries never touched because an exclusion rule matched
    pub excluded: usize,
    /// Paths that produced errors, in encounter order
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn record_error(&mut self, path: impl Into<String>) {
        self.errors.push(path.into());
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Report generator for run results.
pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Prints the save-mode summary table.
    pub fn print_save_report(&self, summary: &RunSummary, output: &str, duration: Duration) {
        let rows = vec![
            row("Snapshot file", output.to_string()),
            row("Entries captured", summary.captured.to_string()),
            row("Entries excluded", summary.excluded.to_string()),
            row("Errors", summary.error_count().to_string()),
            row("Duration", format!("{duration:.2?}")),
        ];
        println!("\nSAVE COMPLETE\n{}", render(rows));
    }

    /// Prints the restore-mode summary table.
    pub fn print_restore_report(&self, summary: &RunSummary, input: &str, duration: Duration) {
        let rows = vec![
            row("Snapshot file", input.to_string()),
            row("Entries updated", summary.applied.to_string()),
            row("Already up to date", summary.unchanged.to_string()),
            row("Entries skipped", summary.skipped.to_string()),
            row("Entries excluded", summary.excluded.to_string()),
            row("Errors", summary.error_count().to_string()),
            row("Duration", format!("{duration:.2?}")),
        ];
        println!("\nRESTORE COMPLETE\n{}", render(rows));
    }

    /// Prints the paths that errored, one per line.
    pub fn print_errors(&self, summary: &RunSummary) {
        if summary.errors.is_empty() {
            return;
        }
        eprintln!("\nErrored files/folders:\n");
        for path in &summary.errors {
            eprintln!("{path}");
        }
        eprintln!(
            "\nThere were {} errors while processing the entries.",
            summary.error_count()
        );
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    key: String,

    #[tabled(rename = "Value")]
    value: String,
}

fn row(key: &str, value: String) -> SummaryRow {
    SummaryRow {
        key: key.to_string(),
        value,
    }
}

fn render(rows: Vec<SummaryRow>) -> String {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Padding::new(1, 1, 0, 0))
        .with(Modify::new(Columns::new(..)).with(Alignment::left()));
    table.to_string()
}
