//! Sequential bulk operation runner
//!
//! Runs one async action per work item, strictly in input order and never
//! two at a time. Each finished item is logged and reported through the
//! progress callback before the next one starts. Failures are counted and
//! the run carries on.

pub mod cancel;
pub mod operations;

pub use cancel::CancelToken;
pub use operations::BulkOperation;

use chrono::{DateTime, Local};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// One unit of work: a human label plus whatever the action needs
#[derive(Debug, Clone)]
pub struct BulkItem<T> {
    pub label: String,
    pub payload: T,
}

impl<T> BulkItem<T> {
    pub fn new(label: impl Into<String>, payload: T) -> Self {
        Self {
            label: label.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Timestamped log line of a run
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Result of a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub index: usize,
    pub label: String,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Snapshot handed to the progress callback after each item
#[derive(Debug)]
pub struct BulkProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub last: &'a ItemOutcome,
    pub entry: &'a LogEntry,
}

impl BulkProgress<'_> {
    pub fn percent(&self) -> u8 {
        percent(self.completed, self.total)
    }
}

fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// Final tally of a run
///
/// `succeeded + failed + skipped == total`; `skipped` is only non-zero
/// when the run was cancelled.
#[derive(Debug, Clone)]
pub struct BulkSummary {
    pub operation: BulkOperation,
    pub state: RunState,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<ItemOutcome>,
    pub log: Vec<LogEntry>,
}

impl BulkSummary {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn headline(&self) -> String {
        let mut line = format!(
            "Total: {} | Succeeded: {} | Failed: {}",
            self.total, self.succeeded, self.failed
        );
        if self.skipped > 0 {
            line.push_str(&format!(" | Skipped: {}", self.skipped));
        }
        line
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// In-flight state of one run, discarded into a `BulkSummary` at the end
struct BulkRun {
    operation: BulkOperation,
    state: RunState,
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    outcomes: Vec<ItemOutcome>,
    log: Vec<LogEntry>,
}

impl BulkRun {
    fn new(operation: BulkOperation, total: usize) -> Self {
        Self {
            operation,
            state: RunState::Idle,
            total,
            completed: 0,
            succeeded: 0,
            failed: 0,
            outcomes: Vec::with_capacity(total),
            log: Vec::with_capacity(total),
        }
    }

    fn record(&mut self, index: usize, label: String, result: Result<(), String>) {
        let entry = match &result {
            Ok(()) => {
                self.succeeded += 1;
                LogEntry {
                    timestamp: Local::now(),
                    level: LogLevel::Success,
                    message: format!("✓ Successfully {}: {}", self.operation.past_tense(), label),
                }
            }
            Err(reason) => {
                self.failed += 1;
                LogEntry {
                    timestamp: Local::now(),
                    level: LogLevel::Error,
                    message: format!("✗ Failed to {} {}: {}", self.operation.verb(), label, reason),
                }
            }
        };

        self.completed += 1;
        self.outcomes.push(ItemOutcome {
            index,
            label,
            error: result.err(),
        });
        self.log.push(entry);
    }

    fn finish(self) -> BulkSummary {
        BulkSummary {
            operation: self.operation,
            state: self.state,
            total: self.total,
            completed: self.completed,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.total - self.completed,
            outcomes: self.outcomes,
            log: self.log,
        }
    }
}

/// Runs bulk operations one item at a time
#[derive(Debug, Clone)]
pub struct BulkRunner {
    operation: BulkOperation,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl BulkRunner {
    pub fn new(operation: BulkOperation) -> Self {
        Self {
            operation,
            timeout: None,
            cancel: None,
        }
    }

    /// Fail any single action that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn operation(&self) -> BulkOperation {
        self.operation
    }

    /// Execute `action` for every item in order and return the tally
    ///
    /// `on_progress` is called synchronously after each item, before the
    /// next action starts.
    pub async fn run<T, R, E, F, Fut, P>(
        &self,
        items: Vec<BulkItem<T>>,
        mut action: F,
        mut on_progress: P,
    ) -> BulkSummary
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: fmt::Display,
        P: FnMut(&BulkProgress<'_>),
    {
        let mut run = BulkRun::new(self.operation, items.len());
        run.state = RunState::Running;

        tracing::info!(
            "Starting {} of {} {}",
            self.operation.title().to_lowercase(),
            run.total,
            self.operation.noun()
        );

        for (index, item) in items.into_iter().enumerate() {
            if self.is_cancelled() {
                run.state = RunState::Cancelled;
                break;
            }

            tracing::debug!(
                "{} {}/{}: {}",
                self.operation.progressive(),
                index + 1,
                run.total,
                item.label
            );

            let result = self.execute(action(item.payload)).await;
            if let Err(reason) = &result {
                tracing::debug!("{} failed: {}", item.label, reason);
            }
            run.record(index, item.label, result);

            if let (Some(last), Some(entry)) = (run.outcomes.last(), run.log.last()) {
                on_progress(&BulkProgress {
                    completed: run.completed,
                    total: run.total,
                    last,
                    entry,
                });
            }
        }

        if run.state == RunState::Running {
            run.state = if self.is_cancelled() {
                RunState::Cancelled
            } else {
                RunState::Complete
            };
        }

        let summary = run.finish();
        tracing::info!(
            "{} finished ({:?}): {}",
            summary.operation.title(),
            summary.state,
            summary.headline()
        );
        summary
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Await one action under the timeout and cancel token
    async fn execute<R, E, Fut>(&self, fut: Fut) -> Result<(), String>
    where
        Fut: Future<Output = Result<R, E>>,
        E: fmt::Display,
    {
        let timed = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result.map(|_| ()).map_err(|e| e.to_string()),
                    Err(_) => Err(format!("timed out after {:?}", limit)),
                },
                None => fut.await.map(|_| ()).map_err(|e| e.to_string()),
            }
        };

        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    result = timed => result,
                    _ = token.cancelled() => Err("cancelled".to_string()),
                }
            }
            None => timed.await,
        }
    }
}
