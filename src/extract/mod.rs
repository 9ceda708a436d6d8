//! Certificate extraction: locate each "constancia" block in a batch of
//! PDFs and export it as its own vector PDF and PNG.
//!
//! ## Data Flow
//!
//! ```text
//! numbers (spreadsheet column, digits only)
//!     │
//!     ▼
//! PDFs under the source dir (recursive, name order)
//!     │  one spawn_blocking task per PDF
//!     ▼
//! engine (bind, open) ──▶ scan (text hits) ──▶ locate (blocks) ──▶ crop (.pdf + .png)
//! ```
//!
//! pdfium is not async-safe, so all PDF work for a file happens inside a
//! single blocking task. A PDF that cannot be opened or cropped fails its
//! own row only; crops already written from it stay in the report.

pub mod crop;
pub mod engine;
pub mod locate;
pub mod scan;

use crate::config::ExtractionConfig;
use crate::error::{CourierError, RowError};
use crate::orchestrate::{process_rows, RowOutcome};
use crate::output::{CropArtifact, ExtractionReport, PdfCrops};
use crate::table::{digits_only, Table};
use crop::{write_pdf_crop, write_png_crop, NameRegistry};
use engine::{bind_pdfium, open_document};
use locate::{BlockMargins, ConstanciaBlock};
use scan::scan_document;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Distinct certificate numbers from `column`, digits only, in row order.
/// Cells without digits are ignored.
pub fn read_numbers(table: &Table, column: &str) -> Result<Vec<String>, CourierError> {
    let idx = table.require_column(column)?;
    let mut seen = HashSet::new();
    Ok((0..table.len())
        .map(|row| digits_only(table.cell(row, idx)))
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect())
}

/// Files under `dir` with `extension` (case-insensitive), sorted by path.
/// Anything inside `exclude` is skipped so earlier output is never rescanned.
pub fn discover_pdfs(
    dir: &Path,
    extension: &str,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>, CourierError> {
    if !dir.is_dir() {
        return Err(CourierError::LocalPathMissing {
            path: dir.to_path_buf(),
        });
    }
    let exclude = exclude.and_then(|p| p.canonicalize().ok());
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|x| x.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .filter(|p| match (&exclude, p.canonicalize()) {
            (Some(ex), Ok(abs)) => !abs.starts_with(ex),
            _ => true,
        })
        .collect();
    found.sort();
    Ok(found)
}

/// Everything a blocking PDF task needs, owned.
#[derive(Clone)]
struct PdfJob {
    numbers: Arc<Vec<String>>,
    out_dir: PathBuf,
    margins: BlockMargins,
    dpi: u32,
    password: Option<String>,
    library: Option<PathBuf>,
    names: Arc<Mutex<NameRegistry>>,
}

impl PdfJob {
    fn run(&self, source: &Path) -> Result<PdfCrops, RowError> {
        let pdfium = bind_pdfium(self.library.as_deref()).map_err(failed)?;
        let document =
            open_document(&pdfium, source, self.password.as_deref()).map_err(failed)?;
        let blocks =
            scan_document(&document, source, &self.numbers, self.margins).map_err(failed)?;

        let crops = export_blocks(blocks, &self.names, |block, stem| {
            let pdf_path = self.out_dir.join(format!("{stem}.pdf"));
            let png_path = self.out_dir.join(format!("{stem}.png"));

            write_pdf_crop(&pdfium, &document, block.page_index, &block.bbox, &pdf_path)?;
            let page = document
                .pages()
                .get(block.page_index as u16)
                .map_err(|e| CourierError::PageFailed {
                    path: source.to_path_buf(),
                    page: block.page_index + 1,
                    detail: format!("{e:?}"),
                })?;
            write_png_crop(&page, &block.bbox, self.dpi, &png_path)?;

            Ok(CropArtifact {
                number: block.number.clone(),
                page_index: block.page_index,
                bbox: block.bbox,
                pdf_path,
                png_path,
            })
        })?;

        Ok(PdfCrops {
            source: source.to_path_buf(),
            crops,
        })
    }
}

fn failed(e: CourierError) -> RowError {
    RowError::ExtractionFailed {
        detail: e.to_string(),
        written: Vec::new(),
    }
}

/// Export every block through `export`, handing out stems from `names`.
///
/// A block that fails does not stop the others. If any failed, the error
/// lists every failure and carries the crops that were written.
fn export_blocks<F>(
    blocks: Vec<ConstanciaBlock>,
    names: &Mutex<NameRegistry>,
    mut export: F,
) -> Result<Vec<CropArtifact>, RowError>
where
    F: FnMut(&ConstanciaBlock, &str) -> Result<CropArtifact, CourierError>,
{
    let mut crops = Vec::with_capacity(blocks.len());
    let mut errors = Vec::new();
    for block in &blocks {
        let stem = names
            .lock()
            .map_err(|_| failed(CourierError::Internal("name registry poisoned".into())))?
            .stem_for(&block.number);
        match export(block, &stem) {
            Ok(crop) => crops.push(crop),
            Err(e) => {
                warn!("Crop '{stem}' (page {}) failed: {e}", block.page_index + 1);
                errors.push(format!("{stem}: {e}"));
            }
        }
    }
    if errors.is_empty() {
        Ok(crops)
    } else {
        Err(RowError::ExtractionFailed {
            detail: format!(
                "{} of {} crop(s) failed: {}",
                errors.len(),
                blocks.len(),
                errors.join("; ")
            ),
            written: crops,
        })
    }
}

/// Crop every block for `numbers` found in the PDFs under `pdf_dir` into
/// `out_dir`.
///
/// # Errors
/// Fatal only when the source directory is missing, the output directory
/// cannot be created or pdfium cannot be bound. Per-PDF problems become
/// failed rows.
pub async fn extract_constancias(
    numbers: Vec<String>,
    pdf_dir: &Path,
    out_dir: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionReport, CourierError> {
    let pdfs = discover_pdfs(pdf_dir, &config.pdf_extension, Some(out_dir))?;
    std::fs::create_dir_all(out_dir).map_err(|e| CourierError::OutputWriteFailed {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let library = config.pdfium_library_path.clone();
    tokio::task::spawn_blocking(move || bind_pdfium(library.as_deref()).map(drop))
        .await
        .map_err(|e| CourierError::Internal(format!("pdfium bind task panicked: {e}")))??;

    if numbers.is_empty() {
        warn!("No certificate numbers to look for");
    }
    info!(
        "Scanning {} PDF(s) in {} for {} number(s)",
        pdfs.len(),
        pdf_dir.display(),
        numbers.len()
    );

    let job = PdfJob {
        numbers: Arc::new(numbers),
        out_dir: out_dir.to_path_buf(),
        margins: BlockMargins {
            top: config.top_margin,
            gap: config.gap_margin,
        },
        dpi: config.dpi,
        password: config.password.clone(),
        library: config.pdfium_library_path.clone(),
        names: Arc::new(Mutex::new(NameRegistry::new(config.collision_policy))),
    };

    let report = process_rows(pdfs, config.progress_callback.as_ref(), |_, source| {
        let job = job.clone();
        async move {
            let result = tokio::task::spawn_blocking(move || job.run(&source)).await;
            match result {
                Ok(Ok(crops)) => RowOutcome::Succeeded(crops),
                Ok(Err(e)) => RowOutcome::Failed(e),
                Err(e) => RowOutcome::Failed(RowError::ExtractionFailed {
                    detail: format!("extraction task panicked: {e}"),
                    written: Vec::new(),
                }),
            }
        }
    })
    .await;

    if report.crop_count() == 0 {
        warn!("No certificate blocks found in any PDF");
    } else {
        info!("Exported {} crop(s) to {}", report.crop_count(), out_dir.display());
    }
    Ok(report)
}
