//! Progress-callback trait for per-row pipeline events.
//!
//! Inject an [`Arc<dyn CourierProgressCallback>`] via
//! [`crate::config::CourierConfigBuilder::progress_callback`] (or the
//! extraction builder) to receive events as the orchestrator walks the rows.
//!
//! The same trait serves both pipelines: distribution reports one event per
//! spreadsheet row, extraction one event per scanned PDF. A front-end
//! (terminal bar, desktop form, log shipper) only needs to implement this
//! trait; the library never prints.
//!
//! # Example
//!
//! ```rust
//! use doc_courier::{CourierConfig, CourierProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl CourierProgressCallback for FailureCounter {
//!     fn on_row_failed(&self, _index: usize, label: &str, reason: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{label}: {reason}");
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failed: AtomicUsize::new(0) });
//! let config = CourierConfig::builder()
//!     .progress_callback(counter as Arc<dyn CourierProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::RunSummary;
use std::sync::Arc;

/// Called by the row orchestrator as it processes each row.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Rows are processed sequentially, but the trait is
/// `Send + Sync` so implementations can be shared with other tasks.
pub trait CourierProgressCallback: Send + Sync {
    /// Called once before the first row.
    ///
    /// # Arguments
    /// * `total_rows` — number of rows (or PDFs) that will be processed
    fn on_run_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called just before a row is handled.
    ///
    /// # Arguments
    /// * `index` — zero-based position in the run
    /// * `label` — short human label (folder code, PDF file name)
    fn on_row_start(&self, index: usize, label: &str) {
        let _ = (index, label);
    }

    /// Called when a row succeeded.
    ///
    /// `detail` is a one-line description of what happened, e.g. the web
    /// address of the uploaded file or the intended target in dry-run mode.
    fn on_row_complete(&self, index: usize, label: &str, detail: &str) {
        let _ = (index, label, detail);
    }

    /// Called when a row was skipped because its data was incomplete or its
    /// local file is absent. Skipped rows count as failures in the summary.
    fn on_row_skipped(&self, index: usize, label: &str, reason: &str) {
        let _ = (index, label, reason);
    }

    /// Called when a row failed during resolution or upload.
    fn on_row_failed(&self, index: usize, label: &str, reason: &str) {
        let _ = (index, label, reason);
    }

    /// Called once after every row has been attempted.
    fn on_run_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CourierProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in the config structs.
pub type ProgressCallback = Arc<dyn CourierProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        skips: AtomicUsize,
        failures: AtomicUsize,
        run_total: AtomicUsize,
    }

    impl CourierProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_rows: usize) {
            self.run_total.store(total_rows, Ordering::SeqCst);
        }

        fn on_row_start(&self, _index: usize, _label: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_complete(&self, _index: usize, _label: &str, _detail: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_skipped(&self, _index: usize, _label: &str, _reason: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_failed(&self, _index: usize, _label: &str, _reason: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_row_start(0, "0701-0057");
        cb.on_row_complete(0, "0701-0057", "https://example/x");
        cb.on_row_skipped(1, "", "row data incomplete");
        cb.on_row_failed(2, "0999", "no folder");
        cb.on_run_complete(&RunSummary::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_run_start(3);
        tracker.on_row_start(0, "a");
        tracker.on_row_complete(0, "a", "ok");
        tracker.on_row_start(1, "b");
        tracker.on_row_skipped(1, "b", "empty code");
        tracker.on_row_start(2, "c");
        tracker.on_row_failed(2, "c", "HTTP 500");

        assert_eq!(tracker.run_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_row_start(0, "x");
    }
}
