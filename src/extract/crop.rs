//! Writes a located block out as a vector PDF and a PNG.

use crate::config::CollisionPolicy;
use crate::error::CourierError;
use crate::extract::locate::BoundingBox;
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hands out output file stems per certificate number.
#[derive(Debug, Default)]
pub struct NameRegistry {
    policy: CollisionPolicy,
    seen: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            seen: HashMap::new(),
        }
    }

    /// `123`, then `123_2`, `123_3`… under [`CollisionPolicy::Suffix`];
    /// always `123` under [`CollisionPolicy::Overwrite`].
    pub fn stem_for(&mut self, number: &str) -> String {
        let count = self.seen.entry(number.to_string()).or_insert(0);
        *count += 1;
        match (self.policy, *count) {
            (CollisionPolicy::Overwrite, _) | (_, 1) => number.to_string(),
            (CollisionPolicy::Suffix, n) => format!("{number}_{n}"),
        }
    }
}

/// `(bottom, left, top, right)` of a top-origin box in bottom-origin page
/// space: `y' = page_height − y`, so the box's top becomes the larger value.
pub fn flip_to_pdf_space(bbox: &BoundingBox, page_height: f32) -> (f32, f32, f32, f32) {
    (
        page_height - bbox.bottom,
        bbox.left,
        page_height - bbox.top,
        bbox.right,
    )
}

/// Convert a top-origin box to pdfium's bottom-origin rectangle.
pub fn to_pdf_rect(bbox: &BoundingBox, page_height: f32) -> PdfRect {
    let (bottom, left, top, right) = flip_to_pdf_space(bbox, page_height);
    PdfRect::new_from_values(bottom, left, top, right)
}

fn write_failed(path: &Path, detail: impl ToString) -> CourierError {
    CourierError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: std::io::Error::other(detail.to_string()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn commit(tmp: &Path, path: &Path) -> Result<(), CourierError> {
    std::fs::rename(tmp, path).map_err(|e| CourierError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Single-page PDF of `page_index` whose media and crop boxes are `bbox`.
///
/// Written to a temporary file first and renamed into place.
pub fn write_pdf_crop(
    pdfium: &Pdfium,
    source: &PdfDocument,
    page_index: usize,
    bbox: &BoundingBox,
    path: &Path,
) -> Result<(), CourierError> {
    let height = source
        .pages()
        .get(page_index as u16)
        .map_err(|e| write_failed(path, format!("{e:?}")))?
        .height()
        .value;
    let rect = to_pdf_rect(bbox, height);

    let mut out = pdfium
        .create_new_pdf()
        .map_err(|e| write_failed(path, format!("{e:?}")))?;
    out.pages_mut()
        .copy_page_from_document(source, page_index as u16, 0)
        .map_err(|e| write_failed(path, format!("{e:?}")))?;
    let mut page = out
        .pages()
        .get(0)
        .map_err(|e| write_failed(path, format!("{e:?}")))?;
    page.boundaries_mut()
        .set_media(rect)
        .map_err(|e| write_failed(path, format!("{e:?}")))?;
    page.boundaries_mut()
        .set_crop(rect)
        .map_err(|e| write_failed(path, format!("{e:?}")))?;

    let tmp = tmp_path(path);
    out.save_to_file(&tmp)
        .map_err(|e| write_failed(path, format!("{e:?}")))?;
    commit(&tmp, path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// PNG of `bbox` rendered at `dpi`.
pub fn write_png_crop(
    page: &PdfPage,
    bbox: &BoundingBox,
    dpi: u32,
    path: &Path,
) -> Result<(), CourierError> {
    let scale = dpi as f32 / 72.0;
    let config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| write_failed(path, format!("{e:?}")))?;
    let image = bitmap.as_image();

    let px = |v: f32, max: u32| ((v * scale).round().max(0.0) as u32).min(max);
    let x = px(bbox.left, image.width());
    let y = px(bbox.top, image.height());
    let w = px(bbox.right, image.width()).saturating_sub(x).max(1);
    let h = px(bbox.bottom, image.height()).saturating_sub(y).max(1);
    let cropped = image.crop_imm(x, y, w, h);

    let tmp = tmp_path(path);
    cropped
        .save_with_format(&tmp, image::ImageFormat::Png)
        .map_err(|e| write_failed(path, e))?;
    commit(&tmp, path)?;
    debug!("Wrote {} ({}x{} px)", path.display(), cropped.width(), cropped.height());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_policy_numbers_repeats() {
        let mut names = NameRegistry::new(CollisionPolicy::Suffix);
        assert_eq!(names.stem_for("123"), "123");
        assert_eq!(names.stem_for("456"), "456");
        assert_eq!(names.stem_for("123"), "123_2");
        assert_eq!(names.stem_for("123"), "123_3");
    }

    #[test]
    fn overwrite_policy_reuses_stem() {
        let mut names = NameRegistry::new(CollisionPolicy::Overwrite);
        assert_eq!(names.stem_for("123"), "123");
        assert_eq!(names.stem_for("123"), "123");
    }

    fn a4_block() -> BoundingBox {
        BoundingBox {
            left: 0.0,
            top: 100.0,
            right: 595.0,
            bottom: 300.0,
        }
    }

    #[test]
    fn flip_swaps_top_and_bottom() {
        let (bottom, left, top, right) = flip_to_pdf_space(&a4_block(), 842.0);
        assert_eq!(bottom, 542.0);
        assert_eq!(top, 742.0);
        assert_eq!((left, right), (0.0, 595.0));
    }

    #[test]
    fn pdf_rect_is_bottom_origin() {
        let rect = to_pdf_rect(&a4_block(), 842.0);
        assert_eq!(rect.bottom().value, 542.0);
        assert_eq!(rect.top().value, 742.0);
        assert_eq!(rect.left().value, 0.0);
        assert_eq!(rect.right().value, 595.0);
    }

    #[test]
    fn tmp_path_sits_beside_target() {
        let p = tmp_path(Path::new("/out/123.pdf"));
        assert_eq!(p, PathBuf::from("/out/123.pdf.tmp"));
    }
}
