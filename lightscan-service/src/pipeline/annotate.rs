//! Diagnostic image with detection boxes and symbol labels.

use std::path::Path;

use ab_glyph::{Font, FontRef, FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use super::{Detection, Page};
use crate::config::AnnotationConfig;
use crate::error::ProcessingError;

const BOX_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([220, 0, 0]);

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

fn bundled_font() -> Result<FontRef<'static>, ProcessingError> {
    FontRef::try_from_slice(BUNDLED_FONT).map_err(|e| ProcessingError::Artifact {
        path: "bundled DejaVuSansMono.ttf".to_string(),
        source: Box::new(e),
    })
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read annotation font");
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Invalid annotation font");
            None
        }
    }
}

/// Draw up to `max_detections` labelled boxes from this page.
pub fn draw_detections<F: Font>(
    page: &Page,
    detections: &[Detection],
    config: &AnnotationConfig,
    font: &F,
) -> RgbImage {
    let mut image = page.image.clone();
    let (width, height) = image.dimensions();
    let scale = PxScale::from(config.font_size);

    for detection in detections
        .iter()
        .filter(|d| d.source_sheet == page.sheet_name)
        .take(config.max_detections)
    {
        let bbox = detection.bounding_box;
        let x = bbox.x1.min(width);
        let y = bbox.y1.min(height);
        let w = bbox.width().min(width.saturating_sub(x));
        let h = bbox.height().min(height.saturating_sub(y));

        for t in 0..config.line_thickness {
            let inner_w = w.saturating_sub(2 * t);
            let inner_h = h.saturating_sub(2 * t);
            if inner_w > 0 && inner_h > 0 {
                let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(inner_w, inner_h);
                draw_hollow_rect_mut(&mut image, rect, BOX_COLOR);
            }
        }

        let text_y = y.saturating_sub(config.font_size.ceil() as u32 + 2);
        draw_text_mut(
            &mut image,
            LABEL_COLOR,
            x as i32,
            text_y as i32,
            scale,
            font,
            &detection.symbol,
        );
    }

    image
}

/// Render and save the annotation image for a page as PNG.
///
/// Labels use `font_path` when it loads, the bundled font otherwise.
pub fn write_annotation(
    page: &Page,
    detections: &[Detection],
    config: &AnnotationConfig,
    path: &Path,
) -> Result<(), ProcessingError> {
    let custom_font = config.font_path.as_deref().and_then(load_font);
    let image = match &custom_font {
        Some(font) => draw_detections(page, detections, config, font),
        None => draw_detections(page, detections, config, &bundled_font()?),
    };

    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| ProcessingError::Artifact {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

    debug!(
        path = %path.display(),
        custom_font = custom_font.is_some(),
        "Annotation image written"
    );
    Ok(())
}
