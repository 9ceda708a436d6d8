//! Error types for the doc-courier library.
//!
//! Three error types map onto three failure scopes:
//!
//! * [`CourierError`] — **Fatal**: the run cannot proceed at all (no token,
//!   unknown site or library, missing base path, unreadable spreadsheet).
//!   Returned as `Err(CourierError)` from the top-level pipeline functions
//!   before any row is touched.
//!
//! * [`RowError`] — **Non-fatal**: a single row failed (no matching folder,
//!   local file absent, upload rejected) but the batch continues. Stored
//!   inside [`crate::output::RowRecord`] so callers can inspect every
//!   failure after the run.
//!
//! * [`RemoteError`] — raised by the [`crate::remote::RemoteTree`] client.
//!   Setup code lifts it into a `CourierError`, row handlers into a
//!   `RowError`.

use crate::output::{CropArtifact, Delivery};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc-courier library.
#[derive(Debug, Error)]
pub enum CourierError {
    // ── Setup errors ──────────────────────────────────────────────────────
    /// The identity provider refused to issue a token.
    #[error("Could not acquire an access token: {detail}\nCheck tenant_id, client_id and the client secret.")]
    AuthFailure { detail: String },

    /// The configured site or document library does not exist or is not
    /// visible to the application identity.
    #[error("Could not find {target}: {detail}")]
    SiteOrLibraryNotFound { target: String, detail: String },

    /// The configured base path could not be resolved in the drive.
    #[error("Base path '{path}' not found: {detail}\nEnable --create-missing to create absent folders.")]
    BasePathNotFound { path: String, detail: String },

    /// A folder could not be created because a sibling already uses that name.
    #[error("Cannot create folder '{name}' under '{parent}': an item with that name already exists")]
    CreationConflict { name: String, parent: String },

    /// A remote call failed during setup.
    #[error("Remote request failed during setup: {0}")]
    Remote(#[from] RemoteError),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The spreadsheet or CSV file could not be opened or parsed.
    #[error("Cannot read row source '{path}': {detail}")]
    RowSourceUnreadable { path: PathBuf, detail: String },

    /// The requested sheet does not exist in the workbook.
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// A required column is absent from the header row.
    #[error("Column '{column}' not found. Columns: {available}")]
    MissingColumn { column: String, available: String },

    /// A local file or directory the whole run depends on does not exist.
    #[error("Local path not found: '{path}'")]
    LocalPathMissing { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF could not be opened by pdfium.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none (or a wrong one) was provided.
    #[error("PDF '{path}' is encrypted; provide the password with --password")]
    PasswordRequired { path: PathBuf },

    /// pdfium failed while reading or rendering a page.
    #[error("Page {page} of '{path}': {detail}")]
    PageFailed {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The configuration document could not be read or parsed.
    #[error("Cannot load configuration from '{path}': {detail}")]
    ConfigUnreadable { path: PathBuf, detail: String },

    /// Builder or document validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single row.
///
/// Owned data only, so it can be cloned into several records and serialised
/// into the JSON report.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum RowError {
    /// Folder code or file reference is empty.
    #[error("row data incomplete: {detail}")]
    RowDataIncomplete { detail: String },

    /// The local file for this row does not exist.
    #[error("local file not found: {path}")]
    LocalFileMissing { path: String },

    /// No child folder matched the code.
    #[error("no folder matching '{code}' in {parent}")]
    FolderNotMatched { code: String, parent: String },

    /// The per-row base path override could not be resolved.
    #[error("base path '{path}' not found: {detail}")]
    BasePathNotFound { path: String, detail: String },

    /// The upload was rejected or interrupted.
    #[error("upload of '{file}' failed: {detail}")]
    RemoteUploadFailed { file: String, detail: String },

    /// Some target folders received the file and others did not. `delivered`
    /// lists the uploads that did land.
    #[error("'{file}' reached {} target(s) but not all: {detail}", .delivered.len())]
    PartialDelivery {
        file: String,
        detail: String,
        delivered: Vec<Delivery>,
    },

    /// A read against the remote tree failed while resolving the target.
    #[error("remote lookup failed: {detail}")]
    RemoteLookupFailed { detail: String },

    /// A PDF could not be scanned or cropped. `written` holds the crops
    /// exported from it before or despite the failure.
    #[error("{detail}")]
    ExtractionFailed {
        detail: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        written: Vec<CropArtifact>,
    },
}

/// Errors raised by a [`crate::remote::RemoteTree`] implementation.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// A path segment has no matching child folder.
    #[error("no folder '{segment}' inside '{parent}'")]
    NotFound { segment: String, parent: String },

    /// Folder creation collided with an existing sibling.
    #[error("folder '{name}' already exists inside '{parent}'")]
    CreationConflict { name: String, parent: String },

    /// The service answered with an unexpected HTTP status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The request timed out.
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Network-level failure (DNS, TLS, connection reset).
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {detail}")]
    Decode { url: String, detail: String },

    /// The local file could not be read while uploading.
    #[error("cannot read local file '{path}': {detail}")]
    LocalRead { path: String, detail: String },

    /// Every chunk was accepted but the service never confirmed the upload.
    #[error("upload session for '{name}' did not confirm completion")]
    SessionIncomplete { name: String },
}

impl RemoteError {
    /// `true` for the "this path segment does not exist" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
            || matches!(self, RemoteError::Status { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_not_matched_display() {
        let e = RowError::FolderNotMatched {
            code: "0701-0057".into(),
            parent: "LJC/2025/JUL".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("0701-0057"), "got: {msg}");
        assert!(msg.contains("LJC/2025/JUL"), "got: {msg}");
    }

    #[test]
    fn base_path_display_mentions_flag() {
        let e = CourierError::BasePathNotFound {
            path: "LJC/2025".into(),
            detail: "no folder '2025' inside 'LJC'".into(),
        };
        assert!(e.to_string().contains("--create-missing"));
    }

    #[test]
    fn remote_error_lifts_into_fatal() {
        let remote = RemoteError::Timeout {
            url: "https://graph.example/sites".into(),
            secs: 30,
        };
        let fatal: CourierError = remote.into();
        assert!(fatal.to_string().contains("30s"));
    }

    #[test]
    fn not_found_detection() {
        assert!(RemoteError::NotFound {
            segment: "JUL".into(),
            parent: "2025".into()
        }
        .is_not_found());
        assert!(RemoteError::Status {
            url: "u".into(),
            status: 404,
            body: String::new()
        }
        .is_not_found());
        assert!(!RemoteError::Status {
            url: "u".into(),
            status: 500,
            body: String::new()
        }
        .is_not_found());
    }

    #[test]
    fn partial_delivery_counts_landed_uploads() {
        let e = RowError::PartialDelivery {
            file: "a.pdf".into(),
            detail: "LJC/MARZO/0701-0057_BCP: HTTP 500".into(),
            delivered: vec![Delivery {
                file_name: "a.pdf".into(),
                target_path: "LJC/ENERO/0701-0057_BCP".into(),
                item_id: Some("f1".into()),
                web_url: None,
                dry_run: false,
            }],
        };
        let msg = e.to_string();
        assert!(msg.contains("reached 1 target(s)"), "got: {msg}");
        assert!(msg.contains("MARZO"), "got: {msg}");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("LJC/ENERO/0701-0057_BCP"), "got: {json}");
    }

    #[test]
    fn row_error_serialises() {
        let e = RowError::LocalFileMissing {
            path: "detracciones/123.pdf".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("LocalFileMissing"));
    }
}
