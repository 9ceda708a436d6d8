//! pdfium binding and document loading.
//!
//! pdfium is a dynamically loaded C library. The library is looked up in
//! this order and the first one that binds wins:
//!
//! 1. an explicit path from [`crate::ExtractionConfig::pdfium_library_path`]
//! 2. `PDFIUM_LIB_PATH`
//! 3. the platform library name in the working directory
//! 4. the system library search path

use crate::error::CourierError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a pdfium library file.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// File candidates tried before the system library, in order.
pub fn library_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    if let Ok(env) = std::env::var(PDFIUM_LIB_ENV) {
        if !env.trim().is_empty() {
            candidates.push(PathBuf::from(env));
        }
    }
    candidates.push(PathBuf::from(Pdfium::pdfium_platform_library_name_at_path("./")));
    candidates
}

/// Bind to the first pdfium library that loads.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, CourierError> {
    let mut failures = Vec::new();
    for candidate in library_candidates(explicit) {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => failures.push(format!("{}: {e:?}", candidate.display())),
        }
    }
    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            failures.push(format!("system library: {e:?}"));
            Err(CourierError::PdfiumBindingFailed(failures.join("; ")))
        }
    }
}

/// Open `path`, classifying failures as password or corruption problems.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, CourierError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.to_lowercase().contains("password") {
            CourierError::PasswordRequired {
                path: path.to_path_buf(),
            }
        } else {
            CourierError::CorruptPdf {
                path: path.to_path_buf(),
                detail,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_comes_first() {
        let c = library_candidates(Some(Path::new("/opt/pdfium/libpdfium.so")));
        assert_eq!(c[0], PathBuf::from("/opt/pdfium/libpdfium.so"));
        assert!(c.len() >= 2);
    }

    #[test]
    fn working_dir_candidate_always_present() {
        let c = library_candidates(None);
        let last = c.last().unwrap().to_string_lossy().to_lowercase();
        assert!(last.contains("pdfium"), "got {last}");
    }
}
