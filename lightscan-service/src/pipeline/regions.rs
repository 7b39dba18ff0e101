//! Deterministic sub-region crops.
//!
//! All bounds are clamped to the image before cropping. Crops whose width or
//! height falls below the configured minimum are reported as `None` so OCR is
//! never run on them.

use image::RgbImage;
use image::imageops::crop_imm;

use crate::config::{Edge, RegionSpec};

/// Pixel rectangle inside an image (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    fn is_at_least(&self, min_side: u32) -> bool {
        self.width >= min_side.max(1) && self.height >= min_side.max(1)
    }
}

fn resolve_edge(edge: Edge, extent: u32) -> u32 {
    match edge {
        Edge::FromStart(offset) => offset.min(extent),
        Edge::FromEnd(offset) => extent.saturating_sub(offset),
        Edge::Fraction(fraction) => {
            ((fraction.clamp(0.0, 1.0) * extent as f64) as u32).min(extent)
        }
    }
}

/// Resolve a region spec against image dimensions.
///
/// Inverted edges collapse to a zero-sized rectangle.
pub fn resolve_region(spec: &RegionSpec, width: u32, height: u32) -> PixelRect {
    let left = resolve_edge(spec.left, width);
    let right = resolve_edge(spec.right, width);
    let top = resolve_edge(spec.top, height);
    let bottom = resolve_edge(spec.bottom, height);

    PixelRect {
        x: left,
        y: top,
        width: right.saturating_sub(left),
        height: bottom.saturating_sub(top),
    }
}

/// Square window of `padding` pixels on each side of `center`, clamped to the image.
pub fn window_around(center: (u32, u32), padding: u32, width: u32, height: u32) -> PixelRect {
    let (cx, cy) = center;
    let x1 = cx.saturating_sub(padding).min(width);
    let y1 = cy.saturating_sub(padding).min(height);
    let x2 = cx.saturating_add(padding).min(width);
    let y2 = cy.saturating_add(padding).min(height);

    PixelRect {
        x: x1,
        y: y1,
        width: x2.saturating_sub(x1),
        height: y2.saturating_sub(y1),
    }
}

/// Crop a resolved rectangle, or `None` if it is degenerate.
pub fn crop_rect(image: &RgbImage, rect: PixelRect, min_side: u32) -> Option<RgbImage> {
    if !rect.is_at_least(min_side) {
        return None;
    }
    Some(crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// Crop a named region, or `None` if it is degenerate on this image.
pub fn crop_region(image: &RgbImage, spec: &RegionSpec, min_side: u32) -> Option<RgbImage> {
    let rect = resolve_region(spec, image.width(), image.height());
    crop_rect(image, rect, min_side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn notes_spec() -> RegionSpec {
        RegionSpec {
            left: Edge::FromStart(50),
            top: Edge::FromStart(50),
            right: Edge::FromStart(600),
            bottom: Edge::FromStart(400),
        }
    }

    fn table_spec() -> RegionSpec {
        RegionSpec {
            left: Edge::Fraction(0.5),
            top: Edge::Fraction(0.6),
            right: Edge::FromEnd(50),
            bottom: Edge::FromEnd(100),
        }
    }

    #[test]
    fn test_absolute_region_within_bounds() {
        let rect = resolve_region(&notes_spec(), 2000, 1500);
        assert_eq!(
            rect,
            PixelRect {
                x: 50,
                y: 50,
                width: 550,
                height: 350
            }
        );
    }

    #[test]
    fn test_region_exceeding_image_is_clamped() {
        let image = RgbImage::from_pixel(300, 200, Rgb([255, 255, 255]));
        let crop = crop_region(&image, &notes_spec(), 8).unwrap();
        assert_eq!(crop.dimensions(), (250, 150));
    }

    #[test]
    fn test_mixed_fraction_and_from_end_edges() {
        let rect = resolve_region(&table_spec(), 1000, 800);
        assert_eq!(
            rect,
            PixelRect {
                x: 500,
                y: 480,
                width: 450,
                height: 220
            }
        );
    }

    #[test]
    fn test_degenerate_region_is_rejected() {
        // Notes region starts at 50px; a 40px image leaves nothing
        let image = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        assert!(crop_region(&image, &notes_spec(), 8).is_none());

        // Table region on a tiny image: right edge falls left of the midpoint
        let image = RgbImage::from_pixel(60, 60, Rgb([255, 255, 255]));
        assert!(crop_region(&image, &table_spec(), 8).is_none());
    }

    #[test]
    fn test_window_clamped_at_corner() {
        let rect = window_around((10, 20), 50, 500, 400);
        assert_eq!(
            rect,
            PixelRect {
                x: 0,
                y: 0,
                width: 60,
                height: 70
            }
        );

        let rect = window_around((490, 395), 50, 500, 400);
        assert_eq!(
            rect,
            PixelRect {
                x: 440,
                y: 345,
                width: 60,
                height: 55
            }
        );
    }
}
