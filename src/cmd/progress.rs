//! Progress bar and spinner utilities for CLI operations
//!
//! Bulk runs render as a bar with the run's log lines printed above it.

use crate::bulk::{BulkOperation, BulkProgress, BulkSummary, LogEntry, LogLevel, RunState};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Create a progress bar for determinate operations
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar
}

fn finish_with_prefix(bar: &ProgressBar, template: &str, prefix: &'static str, message: &str) {
    bar.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_prefix(prefix);
    bar.finish_with_message(message.to_string());
}

/// Helper to finish a spinner or bar with a success message
pub fn finish_success(bar: &ProgressBar, message: &str) {
    finish_with_prefix(bar, "{prefix:.green} {msg}", "✓", message);
}

/// Helper to finish a spinner or bar with a warning message
pub fn finish_warning(bar: &ProgressBar, message: &str) {
    finish_with_prefix(bar, "{prefix:.yellow} {msg}", "⚠", message);
}

/// Helper to finish a spinner or bar with an error message
pub fn finish_error(bar: &ProgressBar, message: &str) {
    finish_with_prefix(bar, "{prefix:.red} {msg}", "✗", message);
}

/// Colour a run log line by level
pub fn format_log_entry(entry: &LogEntry) -> String {
    let line = entry.to_string();
    match entry.level {
        LogLevel::Info => line.cyan().to_string(),
        LogLevel::Success => line.green().to_string(),
        LogLevel::Warning => line.yellow().to_string(),
        LogLevel::Error => line.red().to_string(),
    }
}

/// Bar for a bulk run plus the callback that advances it
pub fn bulk_progress(
    operation: BulkOperation,
    total: usize,
) -> (ProgressBar, impl FnMut(&BulkProgress<'_>)) {
    let bar = create_progress_bar(total as u64, operation.progressive());
    bar.println(
        format!(
            "Starting {} of {} {}...",
            operation.title().to_lowercase(),
            total,
            operation.noun()
        )
        .cyan()
        .to_string(),
    );

    let handle = bar.clone();
    let on_progress = move |progress: &BulkProgress<'_>| {
        handle.println(format_log_entry(progress.entry));
        handle.set_position(progress.completed as u64);
    };

    (bar, on_progress)
}

/// Finish the bar and print the run summary
pub fn finish_bulk(bar: &ProgressBar, summary: &BulkSummary) {
    let outcome = match summary.state {
        RunState::Cancelled => "Cancelled",
        _ => "Complete",
    };
    let title = format!("=== {} {} ===", summary.operation.title(), outcome);

    if summary.all_succeeded() {
        finish_success(bar, &title);
        println!("{}", summary.headline().green());
    } else if summary.succeeded > 0 {
        finish_warning(bar, &title);
        println!("{}", summary.headline().yellow());
    } else {
        finish_error(bar, &title);
        println!("{}", summary.headline().red());
    }
}
