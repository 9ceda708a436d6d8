//! # doc-courier
//!
//! Bulk distribution of accounting documents into a SharePoint/OneDrive
//! document library, plus extraction of individual withholding certificates
//! ("constancias") from batch PDFs.
//!
//! ## Why this crate?
//!
//! Month-end closing means copying hundreds of files into supplier folders
//! whose names only start with the code the spreadsheet carries
//! (`0701-0057` lives in `0701-0057_BCP`). Doing it by hand is slow and
//! error-prone; doing it with a script that aborts on the first bad row is
//! worse. This crate resolves each row independently, reports every failure,
//! and never touches anything but the target folder.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Distribution
//!  ├─ 1. Rows     spreadsheet / CSV
//!  ├─ 2. Base     walk (and optionally create) the base path
//!  ├─ 3. Match    exact → prefix → contains among child folders
//!  ├─ 4. Upload   single PUT or chunked session
//!  └─ 5. Report   per-row outcome + summary
//!
//! Extraction
//!  ├─ 1. Numbers  spreadsheet column, digits only
//!  ├─ 2. Scan     pdfium page text (spawn_blocking)
//!  ├─ 3. Locate   one block per number occurrence
//!  ├─ 4. Crop     vector PDF + PNG per block
//!  └─ 5. Report   per-PDF outcome + summary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc_courier::distribute::{distribute, DistributionPlan, FileSource, TargetScope};
//! use doc_courier::remote::GraphClient;
//! use doc_courier::table::Table;
//! use doc_courier::{CourierConfig, TenantConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tenant = TenantConfig::from_file("tenant.json")?;
//!     let config = CourierConfig::builder().dry_run(true).build()?;
//!     let client = GraphClient::connect(&tenant, &config).await?;
//!
//!     let table = Table::read(Path::new("rows.xlsx"), None)?;
//!     let plan = DistributionPlan {
//!         code_column: "CARPETA".into(),
//!         base_column: None,
//!         file_source: FileSource::SameFile("closing.pdf".into()),
//!         scope: TargetScope::Base,
//!         default_base: tenant.base_path.clone(),
//!         months: tenant.months.clone(),
//!     };
//!     let report = distribute(&client, &table, &plan, &config).await?;
//!     eprintln!("{} ok / {} failed", report.summary.succeeded, report.summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc-courier` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doc-courier = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod distribute;
pub mod error;
pub mod extract;
pub mod orchestrate;
pub mod output;
pub mod progress;
pub mod remote;
pub mod resolve;
pub mod table;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CollisionPolicy, CourierConfig, CourierConfigBuilder, ExtractionConfig,
    ExtractionConfigBuilder, TenantConfig,
};
pub use distribute::{distribute, DistributionPlan, FileSource, TargetScope};
pub use error::{CourierError, RemoteError, RowError};
pub use extract::extract_constancias;
pub use orchestrate::{process_rows, RowOutcome};
pub use output::{
    CropArtifact, Delivery, DistributionReport, ExtractionReport, PdfCrops, RowDeliveries,
    RowRecord, RunReport, RunSummary,
};
pub use progress::{CourierProgressCallback, NoopProgressCallback, ProgressCallback};
pub use remote::{DriveItem, GraphClient, RemoteTree};
