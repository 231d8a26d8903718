//! Outer-contour extraction with area gating.

use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use crate::detect::geometry::polygon_area;
use crate::frame::Mask;

/// Smallest region kept; rejects speckle.
pub const MIN_AREA: f64 = 150.0;
/// Largest region kept; rejects whole-frame masks from overexposed scenes.
pub const MAX_AREA: f64 = 300_000.0;

/// Outer boundary of one connected mask region.
#[derive(Clone, Debug)]
pub struct RawContour {
    pub points: Vec<Point<i32>>,
    pub area: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct CandidateExtractor {
    min_area: f64,
    max_area: f64,
}

impl CandidateExtractor {
    pub fn new(min_area: f64, max_area: f64) -> Self {
        Self { min_area, max_area }
    }

    /// Top-level outer borders whose polygon area lies in `[min_area, max_area]`.
    /// Order is unspecified.
    pub fn extract(&self, mask: &Mask) -> Vec<RawContour> {
        find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| {
                let area = polygon_area(&c.points);
                if area < self.min_area || area > self.max_area {
                    log::trace!("contour dropped by area gate: {:.1}", area);
                    return None;
                }
                Some(RawContour {
                    points: c.points,
                    area,
                })
            })
            .collect()
    }
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::new(MIN_AREA, MAX_AREA)
    }
}
