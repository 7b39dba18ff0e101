//! Shaded-rectangle fixture glyph detection.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use tracing::debug;

use super::BoundingBox;
use crate::config::ShapeConfig;

/// A dark rectangular blob that passed the area and aspect filters
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeCandidate {
    pub bounding_box: BoundingBox,
    /// Polygon area of the outer contour
    pub area: f64,
    /// width / height of the bounding box, two decimals
    pub aspect_ratio: f64,
}

/// Shoelace area of a closed contour
fn contour_area(contour: &Contour<u32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

fn contour_bounds(contour: &Contour<u32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        x1 = x1.min(p.x);
        y1 = y1.min(p.y);
        x2 = x2.max(p.x);
        y2 = y2.max(p.y);
    }
    Some(BoundingBox {
        x1,
        y1,
        x2: x2 + 1,
        y2: y2 + 1,
    })
}

/// BT.601 luma (0.299 R + 0.587 G + 0.114 B), the weighting the intensity
/// threshold is calibrated against
fn bt601_luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Find dark, filled, landscape rectangles on a page.
///
/// Foreground is every pixel at or below the intensity threshold. Small gaps
/// are closed before tracing, and only top-level outer contours count.
/// Results are in contour discovery order.
pub fn detect_shaded_rectangles(image: &RgbImage, config: &ShapeConfig) -> Vec<ShapeCandidate> {
    let gray = bt601_luma(image);
    let mut mask = threshold(&gray, config.intensity_threshold, ThresholdType::BinaryInverted);

    let radius = config.closing_kernel / 2;
    if radius > 0 {
        mask = close(&mask, Norm::LInf, radius);
    }

    let contours = find_contours::<u32>(&mask);
    let total = contours.len();

    let candidates: Vec<ShapeCandidate> = contours
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|contour| {
            let area = contour_area(contour);
            if area <= config.min_area || area >= config.max_area {
                return None;
            }
            let bounding_box = contour_bounds(contour)?;
            let height = bounding_box.height();
            if height == 0 {
                return None;
            }
            let ratio = bounding_box.width() as f64 / height as f64;
            if ratio <= config.min_aspect_ratio || ratio >= config.max_aspect_ratio {
                return None;
            }
            let aspect_ratio = (ratio * 100.0).round() / 100.0;
            Some(ShapeCandidate {
                bounding_box,
                area,
                aspect_ratio,
            })
        })
        .collect();

    debug!(
        contours = total,
        candidates = candidates.len(),
        "Shaded rectangle scan complete"
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
    }

    fn fill(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
        for yy in y..y + h {
            for xx in x..x + w {
                image.put_pixel(xx, yy, Rgb([value, value, value]));
            }
        }
    }

    #[test]
    fn test_blank_page_has_no_shapes() {
        let shapes = detect_shaded_rectangles(&blank(400, 300), &ShapeConfig::default());
        assert!(shapes.is_empty());
    }

    #[test]
    fn test_filled_landscape_rectangle_is_detected() {
        let mut image = blank(400, 300);
        fill(&mut image, 100, 120, 60, 25, 20);

        let shapes = detect_shaded_rectangles(&image, &ShapeConfig::default());
        assert_eq!(shapes.len(), 1);

        let shape = &shapes[0];
        assert_eq!(
            shape.bounding_box,
            BoundingBox {
                x1: 100,
                y1: 120,
                x2: 160,
                y2: 145
            }
        );
        assert_eq!(shape.aspect_ratio, 2.4);
        assert_eq!(shape.area, 59.0 * 24.0);
    }

    #[test]
    fn test_area_and_aspect_filters() {
        let mut image = blank(600, 400);
        fill(&mut image, 20, 20, 20, 10, 0); // too small
        fill(&mut image, 100, 20, 40, 40, 0); // square
        fill(&mut image, 200, 20, 200, 80, 0); // too large
        fill(&mut image, 20, 200, 120, 20, 0); // aspect 6.0

        assert!(detect_shaded_rectangles(&image, &ShapeConfig::default()).is_empty());
    }

    #[test]
    fn test_light_gray_is_background() {
        let mut image = blank(400, 300);
        fill(&mut image, 100, 120, 60, 25, 61);
        assert!(detect_shaded_rectangles(&image, &ShapeConfig::default()).is_empty());

        fill(&mut image, 100, 120, 60, 25, 60);
        assert_eq!(
            detect_shaded_rectangles(&image, &ShapeConfig::default()).len(),
            1
        );
    }

    #[test]
    fn test_closing_bridges_hairline_gaps() {
        let mut image = blank(400, 300);
        // Two halves separated by a single white column
        fill(&mut image, 100, 100, 30, 25, 0);
        fill(&mut image, 131, 100, 30, 25, 0);

        let shapes = detect_shaded_rectangles(&image, &ShapeConfig::default());
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].bounding_box.width(), 61);
    }

    #[test]
    fn test_aspect_filter_uses_exact_ratio() {
        let config = ShapeConfig {
            min_aspect_ratio: 2.0,
            max_area: 1_000_000.0,
            ..ShapeConfig::default()
        };
        let mut image = blank(600, 400);
        // 403 / 201 is just above 2.0 but rounds to it
        fill(&mut image, 50, 50, 403, 201, 0);

        let shapes = detect_shaded_rectangles(&image, &config);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].aspect_ratio, 2.0);
    }

    #[test]
    fn test_luma_uses_bt601_weights() {
        // Pure red is 76 under BT.601 and 54 under Rec.709
        let mut image = blank(400, 300);
        for y in 120..145 {
            for x in 100..160 {
                image.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        assert_eq!(bt601_luma(&image).get_pixel(100, 120).0, [76]);
        assert!(detect_shaded_rectangles(&image, &ShapeConfig::default()).is_empty());
    }

    #[test]
    fn test_contour_area_of_degenerate_contour_is_zero() {
        let contour = Contour {
            points: vec![imageproc::point::Point::new(1u32, 1u32)],
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(contour_area(&contour), 0.0);
    }
}
