//! Page rasterization using pdfium-render.
//!
//! Every page is rendered at a fixed DPI into an 8-bit RGB image. Rendering
//! is deterministic for a given document and DPI.

use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

use super::Page;
use crate::error::ProcessingError;

/// PDF user space unit
const POINTS_PER_INCH: f32 = 72.0;

/// Create a new Pdfium instance (dynamically linked).
///
/// Searches for libpdfium in:
/// 1. Current directory (./libpdfium.so)
/// 2. vendor/pdfium/lib/
/// 3. System library paths
pub fn create_pdfium() -> Result<Pdfium, ProcessingError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ProcessingError::PdfiumUnavailable {
            detail: format!("{:?}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Sheet name for a page: document name without its `.pdf` extension, plus the page number.
pub fn sheet_name(document_name: &str, page_number: u32) -> String {
    let base = Path::new(document_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(document_name);
    format!("{}_page_{}", base, page_number)
}

/// Pixel dimensions of a page of the given size in points rendered at `dpi`.
pub fn page_pixel_size(width_pts: f32, height_pts: f32, dpi: f32) -> (i32, i32) {
    let scale = dpi / POINTS_PER_INCH;
    (
        (width_pts * scale).round().max(1.0) as i32,
        (height_pts * scale).round().max(1.0) as i32,
    )
}

/// Render every page of a PDF.
///
/// A document pdfium cannot open is a `DocumentOpen` error; a page that fails
/// to render aborts the document as well.
pub fn rasterize_document(
    path: &Path,
    document_name: &str,
    dpi: f32,
) -> Result<Vec<Page>, ProcessingError> {
    let pdfium = create_pdfium()?;

    let document =
        pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| ProcessingError::DocumentOpen {
                path: path.display().to_string(),
                detail: format!("{:?}", e),
            })?;

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let page_number = index as u32 + 1;
        let (width, height) = page_pixel_size(page.width().value, page.height().value, dpi);

        let config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height);

        let bitmap =
            page.render_with_config(&config)
                .map_err(|e| ProcessingError::Rasterization {
                    page: page_number,
                    detail: format!("{:?}", e),
                })?;

        // pdfium-render handles the BGRA -> RGB channel order
        let image: DynamicImage = bitmap.as_image();
        let image = image.to_rgb8();

        debug!(
            page = page_number,
            width = image.width(),
            height = image.height(),
            dpi = dpi,
            "Rendered page"
        );

        pages.push(Page {
            page_number,
            sheet_name: sheet_name(document_name, page_number),
            image,
        });
    }

    Ok(pages)
}
