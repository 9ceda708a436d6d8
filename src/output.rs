//! Report types returned by the pipelines.
//!
//! Every pipeline returns a [`RunReport`]: one [`RowRecord`] per processed
//! row plus a [`RunSummary`] with the counts the CLI prints at the end.
//! Everything here is `Serialize` so `--json` can dump the whole report.

use crate::error::RowError;
use crate::extract::locate::BoundingBox;
use crate::orchestrate::RowOutcome;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Counts for one run.
///
/// `failed` includes `skipped`: a row with missing data or a missing local
/// file is a failure from the operator's point of view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `failed` that never reached the remote side.
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Result for a single row.
#[derive(Debug, Clone, Serialize)]
pub struct RowRecord<T> {
    /// Zero-based position in the run.
    pub index: usize,
    /// Folder code or PDF file name.
    pub label: String,
    pub outcome: RowOutcome<T>,
}

/// Records plus summary for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<T> {
    pub records: Vec<RowRecord<T>>,
    pub summary: RunSummary,
}

/// A one-line human description of a successful row, used for progress
/// events and the CLI log.
pub trait Describe {
    fn describe(&self) -> String;
}

// ── Distribution ─────────────────────────────────────────────────────────

/// One file placed (or, in dry-run mode, planned) into one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub file_name: String,
    /// Drive-relative display path of the target folder.
    pub target_path: String,
    /// Id of the uploaded item; `None` in dry-run mode.
    pub item_id: Option<String>,
    /// Web address of the uploaded item; `None` in dry-run mode.
    pub web_url: Option<String>,
    pub dry_run: bool,
}

impl Describe for Delivery {
    fn describe(&self) -> String {
        if self.dry_run {
            format!(
                "[dry-run] would copy '{}' → {}",
                self.file_name, self.target_path
            )
        } else {
            format!(
                "'{}' → {}",
                self.file_name,
                self.web_url.as_deref().unwrap_or(&self.target_path)
            )
        }
    }
}

/// Every delivery made for one row. Base scope yields one; month scope one
/// per month folder that contained a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDeliveries {
    pub deliveries: Vec<Delivery>,
}

impl Describe for RowDeliveries {
    fn describe(&self) -> String {
        self.deliveries
            .iter()
            .map(Describe::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Report of a distribution run.
pub type DistributionReport = RunReport<RowDeliveries>;

// ── Extraction ───────────────────────────────────────────────────────────

/// A single exported crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropArtifact {
    pub number: String,
    pub page_index: usize,
    pub bbox: BoundingBox,
    pub pdf_path: PathBuf,
    pub png_path: PathBuf,
}

/// Crops exported from one source PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfCrops {
    pub source: PathBuf,
    pub crops: Vec<CropArtifact>,
}

impl Describe for PdfCrops {
    fn describe(&self) -> String {
        if self.crops.is_empty() {
            return "no matching certificates".to_string();
        }
        let numbers: Vec<String> = self
            .crops
            .iter()
            .map(|c| format!("{} (p{})", c.number, c.page_index + 1))
            .collect();
        format!("{} crop(s): {}", self.crops.len(), numbers.join(", "))
    }
}

/// Report of an extraction run.
pub type ExtractionReport = RunReport<PdfCrops>;

impl ExtractionReport {
    /// Total crops written across every PDF, including those kept from PDFs
    /// that failed part-way.
    pub fn crop_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| match &r.outcome {
                RowOutcome::Succeeded(p) => p.crops.len(),
                RowOutcome::Failed(RowError::ExtractionFailed { written, .. }) => written.len(),
                _ => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(dry_run: bool) -> Delivery {
        Delivery {
            file_name: "a.pdf".into(),
            target_path: "LJC/2025/JUL/0701-0057_BCP".into(),
            item_id: (!dry_run).then(|| "id-1".to_string()),
            web_url: (!dry_run).then(|| "https://contoso/a.pdf".to_string()),
            dry_run,
        }
    }

    #[test]
    fn dry_run_delivery_names_target() {
        let line = delivery(true).describe();
        assert!(line.starts_with("[dry-run]"));
        assert!(line.contains("LJC/2025/JUL/0701-0057_BCP"));
    }

    #[test]
    fn real_delivery_shows_web_url() {
        assert!(delivery(false).describe().contains("https://contoso/a.pdf"));
    }

    fn crop(stem: &str) -> CropArtifact {
        CropArtifact {
            number: "123".into(),
            page_index: 0,
            bbox: BoundingBox {
                left: 0.0,
                top: 10.0,
                right: 100.0,
                bottom: 200.0,
            },
            pdf_path: format!("out/{stem}.pdf").into(),
            png_path: format!("out/{stem}.png").into(),
        }
    }

    #[test]
    fn extraction_crop_count_includes_partial_pdfs() {
        let crops = PdfCrops {
            source: "batch.pdf".into(),
            crops: vec![crop("123")],
        };
        let report = ExtractionReport {
            records: vec![
                RowRecord {
                    index: 0,
                    label: "batch.pdf".into(),
                    outcome: RowOutcome::Succeeded(crops),
                },
                RowRecord {
                    index: 1,
                    label: "broken.pdf".into(),
                    outcome: RowOutcome::Failed(RowError::ExtractionFailed {
                        detail: "corrupt".into(),
                        written: Vec::new(),
                    }),
                },
                RowRecord {
                    index: 2,
                    label: "half.pdf".into(),
                    outcome: RowOutcome::Failed(RowError::ExtractionFailed {
                        detail: "1 of 2 crop(s) failed".into(),
                        written: vec![crop("123_2")],
                    }),
                },
            ],
            summary: RunSummary::default(),
        };
        assert_eq!(report.crop_count(), 2);
    }
}
