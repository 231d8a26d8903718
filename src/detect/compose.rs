//! Confidence scoring and visual overlays.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::point::Point;

use crate::detect::geometry::{centroid, convex_hull, extreme_points};
use crate::detect::result::{BoundingBox, Candidate, Landmark, LandmarkColor};
use crate::frame::{Frame, Mask};

const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const BOX_THICKNESS: i32 = 3;
const CENTROID_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CENTROID_RADIUS: i32 = 7;
const MARKER_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const HULL_MARKER_SIZE: i32 = 20;
const EXTREME_MARKER_SIZE: i32 = 25;
const MARKER_THICKNESS: i32 = 2;
const GRID_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const GRID_RADIUS: i32 = 6;
const GRID_POINTS: u32 = 5;

/// Rasters and scores produced for one frame, before encoding.
#[derive(Debug)]
pub struct Composition {
    pub confidence: f32,
    pub locations: Vec<BoundingBox>,
    pub landmarks: Vec<Landmark>,
    pub segmented: RgbImage,
    pub annotated: RgbImage,
}

#[derive(Clone, Copy, Debug)]
pub struct ResultCompositor {
    confidence_scale: f64,
    annotate_min_mask_pixels: u32,
}

impl ResultCompositor {
    /// `confidence_scale` is the mask pixel count that maps to 100% confidence.
    pub fn new(confidence_scale: f64, annotate_min_mask_pixels: u32) -> Self {
        Self {
            confidence_scale,
            annotate_min_mask_pixels,
        }
    }

    pub fn confidence(&self, red_pixel_count: u32) -> f32 {
        if self.confidence_scale <= 0.0 || !self.confidence_scale.is_finite() {
            return 0.0;
        }
        (f64::from(red_pixel_count) / self.confidence_scale * 100.0).clamp(0.0, 100.0) as f32
    }

    pub fn compose(
        &self,
        frame: &Frame,
        mask: &Mask,
        red_pixel_count: u32,
        candidates: &[Candidate],
    ) -> Composition {
        let mut annotated = frame.canvas();
        let mut landmarks = Vec::new();

        for candidate in candidates {
            if candidate.mask_pixels() < self.annotate_min_mask_pixels {
                continue;
            }
            if let Some(landmark) = annotate(&mut annotated, candidate) {
                landmarks.push(landmark);
            }
        }

        Composition {
            confidence: self.confidence(red_pixel_count),
            locations: candidates.iter().map(Candidate::bbox).collect(),
            landmarks,
            segmented: apply_mask(frame, mask),
            annotated,
        }
    }
}

/// Frame pixels where the mask is set, black elsewhere.
pub fn apply_mask(frame: &Frame, mask: &Mask) -> RgbImage {
    let src = frame.as_image();
    RgbImage::from_fn(src.width(), src.height(), |x, y| {
        if mask.get_pixel(x, y)[0] != 0 {
            *src.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

fn annotate(canvas: &mut RgbImage, candidate: &Candidate) -> Option<Landmark> {
    let bbox = candidate.bbox();
    draw_thick_rect(canvas, bbox, BOX_THICKNESS, BOX_COLOR);

    let center = centroid(candidate.contour());
    if let Some(c) = center {
        draw_filled_circle_mut(canvas, (c.x, c.y), CENTROID_RADIUS, CENTROID_COLOR);
    }

    for p in convex_hull(candidate.contour()) {
        draw_cross(canvas, p, HULL_MARKER_SIZE, MARKER_COLOR);
    }
    if let Some(ext) = extreme_points(candidate.contour()) {
        for p in ext.as_array() {
            draw_cross(canvas, p, EXTREME_MARKER_SIZE, MARKER_COLOR);
        }
    }

    // Pseudo-landmarks along the box diagonal.
    let last = GRID_POINTS - 1;
    for i in 0..GRID_POINTS {
        let px = bbox.x + bbox.width * i / last;
        let py = bbox.y + bbox.height * i / last;
        draw_filled_circle_mut(canvas, (px as i32, py as i32), GRID_RADIUS, GRID_COLOR);
    }

    center.map(|c| Landmark {
        x: c.x,
        y: c.y,
        color: LandmarkColor::Red,
    })
}

fn draw_thick_rect(canvas: &mut RgbImage, bbox: BoundingBox, thickness: i32, color: Rgb<u8>) {
    let base = bbox.to_rect();
    for t in 0..thickness {
        let grow = t - thickness / 2;
        let w = base.width() as i32 + 2 * grow;
        let h = base.height() as i32 + 2 * grow;
        if w <= 0 || h <= 0 {
            continue;
        }
        let rect = imageproc::rect::Rect::at(base.left() - grow, base.top() - grow)
            .of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn draw_cross(canvas: &mut RgbImage, at: Point<i32>, size: i32, color: Rgb<u8>) {
    let half = (size / 2) as f32;
    let (cx, cy) = (at.x as f32, at.y as f32);
    for t in 0..MARKER_THICKNESS {
        let o = (t - MARKER_THICKNESS / 2) as f32;
        draw_line_segment_mut(canvas, (cx - half, cy + o), (cx + half, cy + o), color);
        draw_line_segment_mut(canvas, (cx + o, cy - half), (cx + o, cy + half), color);
    }
}
