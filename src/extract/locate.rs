//! Pure geometry: from number hits on a page to certificate blocks.
//!
//! All coordinates here are top-origin PDF points (y grows downwards), the
//! way a reader looks at the page. Conversion to pdfium's bottom-origin
//! space happens in the cropper.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Label printed above every certificate number, after [`fold_text`].
static LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnumero\s*de\s*constancia\b").unwrap());

/// Axis-aligned box in top-origin page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// One occurrence of a certificate number on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextHit {
    pub number: String,
    /// Top edge of the matched text, top-origin.
    pub top: f32,
    pub bottom: f32,
}

/// A located certificate: the region from just above its number down to
/// just before the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstanciaBlock {
    pub number: String,
    pub page_index: usize,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMargins {
    /// Added above each hit.
    pub top: f32,
    /// Left free before the next hit.
    pub gap: f32,
}

impl Default for BlockMargins {
    fn default() -> Self {
        Self {
            top: 40.0,
            gap: 10.0,
        }
    }
}

/// Lowercase and strip Latin diacritics (`Número` → `numero`).
pub fn fold_text(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Cheap pre-filter run on the whole page text before any geometry query.
///
/// True when the page carries the certificate label or any of `targets`
/// literally.
pub fn page_may_contain(page_text: &str, targets: &[String]) -> bool {
    LABEL.is_match(&fold_text(page_text)) || targets.iter().any(|t| page_text.contains(t.as_str()))
}

/// Turn the hits found on one page into blocks.
///
/// Hits are ordered by their top edge. Each block spans the full page width,
/// starts `margins.top` above its hit (clamped to the page) and ends
/// `margins.gap` before the next hit, or at the page bottom for the last
/// one. The bottom never goes above the block's own top.
pub fn locate_blocks(
    mut hits: Vec<TextHit>,
    page_index: usize,
    page_width: f32,
    page_height: f32,
    margins: BlockMargins,
) -> Vec<ConstanciaBlock> {
    hits.sort_by(|a, b| a.top.total_cmp(&b.top));

    let tops: Vec<f32> = hits.iter().map(|h| h.top).collect();
    hits.into_iter()
        .enumerate()
        .map(|(i, hit)| {
            let top = (hit.top - margins.top).clamp(0.0, page_height);
            let bottom = match tops.get(i + 1) {
                Some(next) => (next - margins.gap).min(page_height).max(top),
                None => page_height,
            };
            ConstanciaBlock {
                number: hit.number,
                page_index,
                bbox: BoundingBox {
                    left: 0.0,
                    top,
                    right: page_width,
                    bottom,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(number: &str, top: f32) -> TextHit {
        TextHit {
            number: number.into(),
            top,
            bottom: top + 12.0,
        }
    }

    #[test]
    fn single_hit_runs_to_page_bottom() {
        let blocks = locate_blocks(vec![hit("123", 300.0)], 0, 595.0, 842.0, BlockMargins::default());
        assert_eq!(blocks.len(), 1);
        let b = blocks[0].bbox;
        assert_eq!(b.top, 260.0);
        assert_eq!(b.bottom, 842.0);
        assert_eq!(b.left, 0.0);
        assert_eq!(b.right, 595.0);
    }

    #[test]
    fn hit_near_top_clamps_to_zero() {
        let blocks = locate_blocks(vec![hit("123", 15.0)], 0, 595.0, 842.0, BlockMargins::default());
        assert_eq!(blocks[0].bbox.top, 0.0);
    }

    #[test]
    fn block_stops_before_next_hit() {
        let blocks = locate_blocks(
            vec![hit("456", 500.0), hit("123", 100.0)],
            2,
            595.0,
            842.0,
            BlockMargins::default(),
        );
        assert_eq!(blocks[0].number, "123");
        assert_eq!(blocks[0].bbox.top, 60.0);
        assert_eq!(blocks[0].bbox.bottom, 490.0);
        assert_eq!(blocks[1].number, "456");
        assert_eq!(blocks[1].bbox.top, 460.0);
        assert_eq!(blocks[1].bbox.bottom, 842.0);
        assert!(blocks.iter().all(|b| b.page_index == 2));
    }

    #[test]
    fn close_hits_never_invert() {
        let blocks = locate_blocks(
            vec![hit("1", 100.0), hit("2", 105.0)],
            0,
            595.0,
            842.0,
            BlockMargins::default(),
        );
        let b = blocks[0].bbox;
        assert!(b.bottom >= b.top, "{b:?}");
        assert_eq!(b.height(), 35.0);
    }

    #[test]
    fn duplicate_numbers_yield_several_blocks() {
        let blocks = locate_blocks(
            vec![hit("123", 100.0), hit("123", 400.0)],
            0,
            595.0,
            842.0,
            BlockMargins::default(),
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn folding_strips_accents() {
        assert_eq!(fold_text("Número de CONSTANCIA"), "numero de constancia");
        assert_eq!(fold_text("AÑO"), "ano");
    }

    #[test]
    fn label_prefilter_is_whitespace_tolerant() {
        assert!(page_may_contain("NÚMERO   DE\nCONSTANCIA: 123", &[]));
        assert!(page_may_contain("numerode constancia", &[]));
        assert!(!page_may_contain("numero de constancias", &[]));
        assert!(page_may_contain("Ref 98765", &["98765".to_string()]));
        assert!(!page_may_contain("nothing here", &["98765".to_string()]));
    }
}
