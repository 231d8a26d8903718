//! Multi-predicate candidate classification.
//!
//! Each predicate looks only at the candidate's own region: the bounding-box
//! crop of the frame restricted to pixels inside the filled outer contour. A
//! region is accepted when every enabled predicate passes. Evaluation stops at
//! the first failure; accepted regions get the full feature set measured.

use std::cell::OnceCell;

use image::{GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::detect::extract::RawContour;
use crate::detect::geometry::{bounding_box, convex_hull, perimeter, polygon_area};
use crate::detect::result::{BoundingBox, Candidate, Features};
use crate::frame::{Frame, Mask};

/// Denominator guard.
const EPS: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Solidity,
    Jaggedness,
    EdgeDensity,
    Entropy,
    Texture,
    RedDominance,
}

impl Predicate {
    pub const ALL: [Predicate; 6] = [
        Predicate::Solidity,
        Predicate::Jaggedness,
        Predicate::EdgeDensity,
        Predicate::Entropy,
        Predicate::Texture,
        Predicate::RedDominance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Solidity => "solidity",
            Predicate::Jaggedness => "jaggedness",
            Predicate::EdgeDensity => "edge_density",
            Predicate::Entropy => "entropy",
            Predicate::Texture => "texture",
            Predicate::RedDominance => "red_dominance",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Predicate::Solidity => 0,
            Predicate::Jaggedness => 1,
            Predicate::EdgeDensity => 2,
            Predicate::Entropy => 3,
            Predicate::Texture => 4,
            Predicate::RedDominance => 5,
        }
    }
}

impl Features {
    pub fn get(&self, predicate: Predicate) -> f64 {
        match predicate {
            Predicate::Solidity => self.solidity,
            Predicate::Jaggedness => self.jaggedness,
            Predicate::EdgeDensity => self.edge_density,
            Predicate::Entropy => self.entropy,
            Predicate::Texture => self.laplacian_variance,
            Predicate::RedDominance => self.red_dominance,
        }
    }
}

/// Accept/reject boundaries for each predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Exclusive upper bound: a region at exactly this solidity is rejected.
    pub max_solidity: f64,
    pub min_jaggedness: f64,
    pub min_edge_density: f64,
    pub min_entropy: f64,
    pub min_laplacian_variance: f64,
    pub min_red_dominance: f64,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_solidity: 0.92,
            min_jaggedness: 0.18,
            min_edge_density: 0.02,
            min_entropy: 4.0,
            min_laplacian_variance: 220.0,
            min_red_dominance: 0.08,
            canny_low: 100.0,
            canny_high: 200.0,
        }
    }
}

impl Thresholds {
    pub fn accepts(&self, predicate: Predicate, value: f64) -> bool {
        match predicate {
            Predicate::Solidity => value < self.max_solidity,
            Predicate::Jaggedness => value >= self.min_jaggedness,
            Predicate::EdgeDensity => value >= self.min_edge_density,
            Predicate::Entropy => value >= self.min_entropy,
            Predicate::Texture => value >= self.min_laplacian_variance,
            Predicate::RedDominance => value >= self.min_red_dominance,
        }
    }

    /// First enabled predicate the measurements fail, if any.
    pub fn first_failure(&self, features: &Features, enabled: &[Predicate]) -> Option<Predicate> {
        enabled
            .iter()
            .copied()
            .find(|&p| !self.accepts(p, features.get(p)))
    }
}

#[derive(Clone, Debug)]
pub struct CandidateClassifier {
    thresholds: Thresholds,
    enabled: Vec<Predicate>,
}

impl CandidateClassifier {
    pub fn new(thresholds: Thresholds, enabled: Vec<Predicate>) -> Self {
        Self {
            thresholds,
            enabled,
        }
    }

    pub fn enabled(&self) -> &[Predicate] {
        &self.enabled
    }

    /// Accept or reject one extracted region.
    pub fn classify(&self, frame: &Frame, mask: &Mask, contour: &RawContour) -> Option<Candidate> {
        let bbox = bounding_box(&contour.points)?;
        let mut region = Region::new(frame.as_image(), bbox, contour, &self.thresholds);

        for &predicate in &self.enabled {
            let value = region.measure(predicate);
            if !self.thresholds.accepts(predicate, value) {
                log::debug!(
                    "region at ({}, {}) {}x{} rejected by {} ({:.4})",
                    bbox.x,
                    bbox.y,
                    bbox.width,
                    bbox.height,
                    predicate.name(),
                    value
                );
                return None;
            }
        }

        let features = region.features();
        let mask_pixels = region.mask_pixels(mask);
        Some(Candidate::new(
            bbox,
            contour.area,
            features,
            contour.points.clone(),
            mask_pixels,
        ))
    }
}

impl Default for CandidateClassifier {
    fn default() -> Self {
        Self::new(Thresholds::default(), Predicate::ALL.to_vec())
    }
}

/// Lazily measured view of one region.
struct Region<'a> {
    frame: &'a RgbImage,
    bbox: BoundingBox,
    contour: &'a RawContour,
    thresholds: &'a Thresholds,
    inside: GrayImage,
    grey: OnceCell<GrayImage>,
    cache: [Option<f64>; 6],
}

impl<'a> Region<'a> {
    fn new(
        frame: &'a RgbImage,
        bbox: BoundingBox,
        contour: &'a RawContour,
        thresholds: &'a Thresholds,
    ) -> Self {
        let inside = fill_contour(&contour.points, bbox);
        Self {
            frame,
            bbox,
            contour,
            thresholds,
            inside,
            grey: OnceCell::new(),
            cache: [None; 6],
        }
    }

    fn measure(&mut self, predicate: Predicate) -> f64 {
        if let Some(v) = self.cache[predicate.slot()] {
            return v;
        }
        let v = match predicate {
            Predicate::Solidity => self.solidity(),
            Predicate::Jaggedness => self.jaggedness(),
            Predicate::EdgeDensity => self.edge_density(),
            Predicate::Entropy => self.entropy(),
            Predicate::Texture => self.laplacian_variance(),
            Predicate::RedDominance => self.red_dominance(),
        };
        self.cache[predicate.slot()] = Some(v);
        v
    }

    fn features(&mut self) -> Features {
        Features {
            solidity: self.measure(Predicate::Solidity),
            jaggedness: self.measure(Predicate::Jaggedness),
            edge_density: self.measure(Predicate::EdgeDensity),
            entropy: self.measure(Predicate::Entropy),
            laplacian_variance: self.measure(Predicate::Texture),
            red_dominance: self.measure(Predicate::RedDominance),
        }
    }

    fn grey(&self) -> &GrayImage {
        self.grey.get_or_init(|| {
            let b = self.bbox;
            let crop = image::imageops::crop_imm(self.frame, b.x, b.y, b.width, b.height).to_image();
            image::imageops::grayscale(&crop)
        })
    }

    /// Region-local coordinates of every pixel inside the contour.
    fn inside_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.inside
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(|(x, y, _)| (x, y))
    }

    fn solidity(&self) -> f64 {
        let hull_area = polygon_area(&convex_hull(&self.contour.points));
        self.contour.area / (hull_area + EPS)
    }

    fn jaggedness(&self) -> f64 {
        let p = perimeter(&self.contour.points);
        p * p / (self.contour.area + EPS)
    }

    fn edge_density(&self) -> f64 {
        let edges = imageproc::edges::canny(
            self.grey(),
            self.thresholds.canny_low,
            self.thresholds.canny_high,
        );
        let count = self
            .inside_pixels()
            .filter(|&(x, y)| edges.get_pixel(x, y)[0] != 0)
            .count();
        count as f64 / (self.contour.area + EPS)
    }

    fn entropy(&self) -> f64 {
        let grey = self.grey();
        let mut histogram = [0u32; 256];
        for (x, y) in self.inside_pixels() {
            histogram[grey.get_pixel(x, y)[0] as usize] += 1;
        }
        shannon_entropy(&histogram)
    }

    fn laplacian_variance(&self) -> f64 {
        let lap = imageproc::filter::laplacian_filter(self.grey());
        let (mut n, mut sum, mut sum_sq) = (0u64, 0f64, 0f64);
        for (x, y) in self.inside_pixels() {
            let v = f64::from(lap.get_pixel(x, y)[0]);
            n += 1;
            sum += v;
            sum_sq += v * v;
        }
        if n == 0 {
            return 0.0;
        }
        let mean = sum / n as f64;
        (sum_sq / n as f64 - mean * mean).max(0.0)
    }

    fn red_dominance(&self) -> f64 {
        let (mut n, mut red, mut green) = (0u64, 0f64, 0f64);
        for (x, y) in self.inside_pixels() {
            let p = self.frame.get_pixel(self.bbox.x + x, self.bbox.y + y);
            n += 1;
            red += f64::from(p[0]);
            green += f64::from(p[1]);
        }
        if n == 0 {
            return 0.0;
        }
        let (mean_r, mean_g) = (red / n as f64, green / n as f64);
        (mean_r - mean_g) / (mean_r + EPS)
    }

    fn mask_pixels(&self, mask: &Mask) -> u32 {
        self.inside_pixels()
            .filter(|&(x, y)| mask.get_pixel(self.bbox.x + x, self.bbox.y + y)[0] != 0)
            .count() as u32
    }
}

/// Shannon entropy in bits of a histogram.
pub(crate) fn shannon_entropy(histogram: &[u32]) -> f64 {
    let total: u64 = histogram.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return 0.0;
    }
    histogram
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = f64::from(c) / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Filled contour rasterized into a bbox-sized mask.
fn fill_contour(points: &[Point<i32>], bbox: BoundingBox) -> GrayImage {
    let mut inside = GrayImage::new(bbox.width, bbox.height);
    let (ox, oy) = (bbox.x as i32, bbox.y as i32);
    let mut poly: Vec<Point<i32>> = points.iter().map(|p| Point::new(p.x - ox, p.y - oy)).collect();
    poly.dedup();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() >= 3 {
        draw_polygon_mut(&mut inside, &poly, Luma([255]));
    }
    for p in &poly {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < bbox.width && (p.y as u32) < bbox.height {
            inside.put_pixel(p.x as u32, p.y as u32, Luma([255]));
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::extract::CandidateExtractor;
    use image::Rgb;

    fn passing_features() -> Features {
        Features {
            solidity: 0.80,
            jaggedness: 30.0,
            edge_density: 0.05,
            entropy: 5.5,
            laplacian_variance: 900.0,
            red_dominance: 0.35,
        }
    }

    #[test]
    fn solidity_boundary_is_rejected() {
        let t = Thresholds::default();
        assert!(!t.accepts(Predicate::Solidity, 0.92));
        assert!(t.accepts(Predicate::Solidity, 0.919_999));
    }

    #[test]
    fn single_feature_flip_rejects() {
        let t = Thresholds::default();
        let base = passing_features();
        assert_eq!(t.first_failure(&base, &Predicate::ALL), None);

        let flips: [(Predicate, fn(&mut Features)); 6] = [
            (Predicate::Solidity, |f| f.solidity = 0.95),
            (Predicate::Jaggedness, |f| f.jaggedness = 0.1),
            (Predicate::EdgeDensity, |f| f.edge_density = 0.019),
            (Predicate::Entropy, |f| f.entropy = 3.9),
            (Predicate::Texture, |f| f.laplacian_variance = 219.0),
            (Predicate::RedDominance, |f| f.red_dominance = 0.07),
        ];
        for (predicate, flip) in flips {
            let mut f = base;
            flip(&mut f);
            assert_eq!(t.first_failure(&f, &Predicate::ALL), Some(predicate));
            // Disabling the predicate restores acceptance.
            let others: Vec<_> = Predicate::ALL.into_iter().filter(|p| *p != predicate).collect();
            assert_eq!(t.first_failure(&f, &others), None);
        }
    }

    #[test]
    fn entropy_of_even_histograms() {
        let mut h = [0u32; 256];
        h[10] = 50;
        h[200] = 50;
        assert!((shannon_entropy(&h) - 1.0).abs() < 1e-12);
        let mut h = [0u32; 256];
        for slot in h.iter_mut().take(16) {
            *slot = 7;
        }
        assert!((shannon_entropy(&h) - 4.0).abs() < 1e-12);
        assert_eq!(shannon_entropy(&[0u32; 256]), 0.0);
    }

    fn square_scene() -> (Frame, Mask, RawContour) {
        let mut img = RgbImage::new(64, 64);
        let mut mask = GrayImage::new(64, 64);
        for y in 12..52 {
            for x in 12..52 {
                img.put_pixel(x, y, Rgb([255, 140, 0]));
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let contour = CandidateExtractor::default().extract(&mask).remove(0);
        (Frame::from_image(img).unwrap(), mask, contour)
    }

    #[test]
    fn compact_uniform_square_is_rejected() {
        let (frame, mask, contour) = square_scene();
        assert!(CandidateClassifier::default()
            .classify(&frame, &mask, &contour)
            .is_none());
    }

    #[test]
    fn no_predicates_accepts_with_full_features() {
        let (frame, mask, contour) = square_scene();
        let candidate = CandidateClassifier::new(Thresholds::default(), vec![])
            .classify(&frame, &mask, &contour)
            .unwrap();
        assert_eq!(
            candidate.bbox(),
            BoundingBox {
                x: 12,
                y: 12,
                width: 40,
                height: 40
            }
        );
        assert_eq!(candidate.mask_pixels(), 1600);
        let f = candidate.features();
        assert!(f.solidity > 0.99);
        assert_eq!(f.entropy, 0.0);
        assert!((f.red_dominance - (255.0 - 140.0) / 255.0).abs() < 1e-6);
    }
}
