//! The row-driven loop shared by both pipelines.
//!
//! Each pipeline supplies a handler that turns one row into a
//! [`RowOutcome`]. The loop owns everything else: progress events, logging
//! and the success/failure counters. A handler never aborts the batch; a
//! fatal condition must be detected during pipeline setup, before the loop
//! starts.

use crate::error::RowError;
use crate::output::{Describe, RowRecord, RunReport, RunSummary};
use crate::progress::ProgressCallback;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use tracing::{info, warn};

/// Tagged outcome of a single row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RowOutcome<T> {
    /// The row was handled; carries the pipeline-specific payload.
    Succeeded(T),
    /// The row never reached the remote side (missing data, missing file).
    Skipped(RowError),
    /// Resolution or transfer failed.
    Failed(RowError),
}

impl<T> RowOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Succeeded(_))
    }
}

/// Something that can name itself in progress output.
pub trait RowLabel {
    fn label(&self) -> String;
}

impl RowLabel for std::path::PathBuf {
    fn label(&self) -> String {
        self.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display().to_string())
    }
}

/// Run `handler` over `rows` sequentially and fold the outcomes into a report.
///
/// The handler receives the zero-based row index and the row by value.
pub async fn process_rows<R, T, F, Fut>(
    rows: Vec<R>,
    progress: Option<&ProgressCallback>,
    mut handler: F,
) -> RunReport<T>
where
    R: RowLabel,
    T: Describe,
    F: FnMut(usize, R) -> Fut,
    Fut: Future<Output = RowOutcome<T>>,
{
    let start = Instant::now();
    let total = rows.len();
    if let Some(cb) = progress {
        cb.on_run_start(total);
    }

    let mut summary = RunSummary::default();
    let mut records = Vec::with_capacity(total);

    for (index, row) in rows.into_iter().enumerate() {
        let label = row.label();
        if let Some(cb) = progress {
            cb.on_row_start(index, &label);
        }

        let outcome = handler(index, row).await;
        summary.processed += 1;

        match &outcome {
            RowOutcome::Succeeded(value) => {
                summary.succeeded += 1;
                let detail = value.describe();
                info!("[{index}] ✓ {label}: {detail}");
                if let Some(cb) = progress {
                    cb.on_row_complete(index, &label, &detail);
                }
            }
            RowOutcome::Skipped(err) => {
                summary.failed += 1;
                summary.skipped += 1;
                warn!("[{index}] skipped {label}: {err}");
                if let Some(cb) = progress {
                    cb.on_row_skipped(index, &label, &err.to_string());
                }
            }
            RowOutcome::Failed(err) => {
                summary.failed += 1;
                warn!("[{index}] ✗ {label}: {err}");
                if let Some(cb) = progress {
                    cb.on_row_failed(index, &label, &err.to_string());
                }
            }
        }

        records.push(RowRecord {
            index,
            label,
            outcome,
        });
    }

    summary.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} processed, {} succeeded, {} failed ({} skipped)",
        summary.processed, summary.succeeded, summary.failed, summary.skipped
    );
    if let Some(cb) = progress {
        cb.on_run_complete(&summary);
    }

    RunReport { records, summary }
}
