//! Square crop boxes around face regions.
//!
//! The box side is the square root of the region area, so wide or tall
//! regions become a square of equal area centred on the region, padded by
//! 10% of the side on every edge and clamped to the image.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::rect::Rect;

/// Side length divided by this gives the padding added on each edge.
const MARGIN_DIVISOR: f64 = 10.0;

/// Pixel bounds `[x1, x2) x [y1, y2)` inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Compute the padded square box for `region` in an image of the given size.
pub fn compute_box(region: &Rect, image_width: u32, image_height: u32) -> CropBox {
    let width = region.width as f64;
    let height = region.height as f64;

    let side = (width * height).sqrt().ceil();
    let margin = side / MARGIN_DIVISOR;
    let cx = region.x as f64 + width / 2.0;
    let cy = region.y as f64 + height / 2.0;

    let x1 = clamp_edge(cx - side / 2.0 - margin, image_width);
    let y1 = clamp_edge(cy - side / 2.0 - margin, image_height);
    let x2 = clamp_edge(cx + side / 2.0 + margin, image_width);
    let y2 = clamp_edge(cy + side / 2.0 + margin, image_height);

    CropBox {
        x1,
        y1,
        x2: x2.max(x1),
        y2: y2.max(y1),
    }
}

fn clamp_edge(edge: f64, limit: u32) -> u32 {
    edge.ceil().clamp(0.0, limit as f64) as u32
}

/// Cut `bounds` out of `img`, then scale to `resize x resize` when non-zero.
pub fn crop_face(img: &RgbImage, bounds: CropBox, resize: u32) -> RgbImage {
    let face = imageops::crop_imm(img, bounds.x1, bounds.y1, bounds.width(), bounds.height())
        .to_image();

    if resize == 0 {
        face
    } else {
        imageops::resize(&face, resize, resize, FilterType::CatmullRom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_box_inside_image() {
        let bounds = compute_box(&Rect::new(100, 100, 40, 90), 500, 500);
        assert_eq!(
            bounds,
            CropBox {
                x1: 84,
                y1: 109,
                x2: 156,
                y2: 181
            }
        );
        assert_eq!(bounds.width(), bounds.height());
    }

    #[test]
    fn test_box_clamped_at_origin() {
        let bounds = compute_box(&Rect::new(0, 0, 20, 20), 100, 100);
        assert_eq!(bounds.x1, 0);
        assert_eq!(bounds.y1, 0);
        assert_eq!(bounds.x2, 22);
        assert_eq!(bounds.y2, 22);
    }

    #[test]
    fn test_box_clamped_at_far_edge() {
        let bounds = compute_box(&Rect::new(90, 80, 20, 30), 100, 100);
        assert_eq!(bounds.x2, 100);
        assert_eq!(bounds.y2, 100);
        // side = 25, margin = 2.5, centre = (100, 95)
        assert_eq!(bounds.x1, 85);
        assert_eq!(bounds.y1, 80);
    }

    #[test]
    fn test_fractional_edges_round_up() {
        // side = ceil(sqrt(15)) = 4, margin = 0.4, centre = (3.5, 4.5)
        let bounds = compute_box(&Rect::new(2, 2, 3, 5), 50, 50);
        assert_eq!(
            bounds,
            CropBox {
                x1: 2,
                y1: 3,
                x2: 6,
                y2: 7
            }
        );
    }

    #[test]
    fn test_region_outside_image_is_empty() {
        let bounds = compute_box(&Rect::new(400, 400, 10, 10), 100, 100);
        assert!(bounds.is_empty());
        assert!(bounds.x1 <= 100 && bounds.x2 <= 100);
    }

    #[test]
    fn test_crop_and_resize() {
        let img = RgbImage::from_pixel(100, 200, Rgb([9, 9, 9]));
        let bounds = compute_box(&Rect::new(100, 100, 40, 90), 100, 200);
        assert_eq!(bounds.x2, 100);

        let face = crop_face(&img, bounds, 0);
        assert_eq!(face.dimensions(), (bounds.width(), bounds.height()));

        let small = crop_face(&img, bounds, 32);
        assert_eq!(small.dimensions(), (32, 32));
    }
}
