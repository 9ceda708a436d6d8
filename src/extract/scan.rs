//! Finds certificate numbers on the pages of an open document.

use crate::error::CourierError;
use crate::extract::locate::{locate_blocks, page_may_contain, BlockMargins, ConstanciaBlock, TextHit};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Every block for every target on every page of `document`, in page order
/// and top-to-bottom within a page.
///
/// Pages without the label and without any target in their text are skipped
/// before any geometry is read.
pub fn scan_document(
    document: &PdfDocument,
    path: &Path,
    targets: &[String],
    margins: BlockMargins,
) -> Result<Vec<ConstanciaBlock>, CourierError> {
    let mut blocks = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let page_failed = |detail: String| CourierError::PageFailed {
            path: path.to_path_buf(),
            page: index + 1,
            detail,
        };
        let text = page.text().map_err(|e| page_failed(format!("{e:?}")))?;
        if !page_may_contain(&text.all(), targets) {
            continue;
        }

        let height = page.height().value;
        let width = page.width().value;
        let hits = page_hits(&text, targets, height);
        if hits.is_empty() {
            continue;
        }
        debug!("Page {}: {} hit(s)", index + 1, hits.len());
        blocks.extend(locate_blocks(hits, index, width, height, margins));
    }
    Ok(blocks)
}

/// One hit per search match of each target on the page.
///
/// A match may span several text segments (a number split across runs);
/// its extent is the union of their bounds.
fn page_hits(text: &PdfPageText, targets: &[String], page_height: f32) -> Vec<TextHit> {
    let options = PdfSearchOptions::new();
    let mut hits = Vec::new();
    for target in targets {
        let search = match text.search(target, &options) {
            Ok(search) => search,
            Err(e) => {
                debug!("Search for '{target}' failed: {e:?}");
                continue;
            }
        };
        for segments in search.iter(PdfSearchDirection::SearchForward) {
            let rects = segments.iter().map(|segment| {
                let bounds = segment.bounds();
                (bounds.top().value, bounds.bottom().value)
            });
            hits.extend(merge_match_bounds(target, rects, page_height));
        }
    }
    hits
}

/// Top-origin hit covering every `(top, bottom)` rectangle, given in
/// bottom-origin page points. `None` when there are no rectangles.
pub fn merge_match_bounds(
    number: &str,
    rects: impl IntoIterator<Item = (f32, f32)>,
    page_height: f32,
) -> Option<TextHit> {
    let (top, bottom) = rects.into_iter().fold(None::<(f32, f32)>, |acc, (top, bottom)| match acc {
        None => Some((top, bottom)),
        Some((t, b)) => Some((f32::max(t, top), f32::min(b, bottom))),
    })?;
    Some(TextHit {
        number: number.to_string(),
        top: page_height - top,
        bottom: page_height - bottom,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_flips_to_top_origin() {
        let hit = merge_match_bounds("00123", [(712.0, 700.0)], 842.0).unwrap();
        assert_eq!(hit.number, "00123");
        assert_eq!(hit.top, 130.0);
        assert_eq!(hit.bottom, 142.0);
    }

    #[test]
    fn split_number_covers_both_segments() {
        // "001" on one run, "23" slightly lower on the next.
        let hit = merge_match_bounds("00123", [(712.0, 700.0), (710.0, 697.0)], 842.0).unwrap();
        assert_eq!(hit.top, 130.0);
        assert_eq!(hit.bottom, 145.0);
    }

    #[test]
    fn no_segments_no_hit() {
        assert!(merge_match_bounds("00123", std::iter::empty(), 842.0).is_none());
    }
}
