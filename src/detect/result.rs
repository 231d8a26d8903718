use imageproc::point::Point;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::artifact::EncodedImage;

/// Axis-aligned pixel bounds of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_disjoint(&self, other: &BoundingBox) -> bool {
        self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y
    }

    pub(crate) fn to_rect(self) -> Rect {
        Rect::at(self.x as i32, self.y as i32).of_size(self.width.max(1), self.height.max(1))
    }
}

/// Measurements taken while classifying a region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Features {
    /// Region area over convex hull area.
    pub solidity: f64,
    /// Perimeter squared over area.
    pub jaggedness: f64,
    /// Canny edge pixels inside the region over area.
    pub edge_density: f64,
    /// Shannon entropy (bits) of the region's greyscale histogram.
    pub entropy: f64,
    /// Variance of the Laplacian inside the region.
    pub laplacian_variance: f64,
    /// (mean R - mean G) / mean R inside the region.
    pub red_dominance: f64,
}

/// An accepted fire region.
#[derive(Clone, Debug)]
pub struct Candidate {
    bbox: BoundingBox,
    area: f64,
    features: Features,
    contour: Vec<Point<i32>>,
    mask_pixels: u32,
}

impl Candidate {
    pub(crate) fn new(
        bbox: BoundingBox,
        area: f64,
        features: Features,
        contour: Vec<Point<i32>>,
        mask_pixels: u32,
    ) -> Self {
        Self {
            bbox,
            area,
            features,
            contour,
            mask_pixels,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Polygon area of the outer contour.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn contour(&self) -> &[Point<i32>] {
        &self.contour
    }

    /// Fire-mask pixels inside the filled contour.
    pub fn mask_pixels(&self) -> u32 {
        self.mask_pixels
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkColor {
    Red,
}

/// Centroid marker reported alongside the annotated artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Landmark {
    pub x: i32,
    pub y: i32,
    pub color: LandmarkColor,
}

/// User-visible output of one detection call.
#[derive(Clone, Debug, Serialize)]
pub struct DetectionResult {
    pub detected: bool,
    /// Percentage in [0, 100].
    pub confidence: f32,
    pub red_pixel_count: u32,
    pub locations: Vec<BoundingBox>,
    pub landmarks: Vec<Landmark>,
    pub segmented_image: EncodedImage,
    pub annotated_image: EncodedImage,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}
