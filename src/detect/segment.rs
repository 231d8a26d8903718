//! Color-space segmentation.
//!
//! Three independent cues are thresholded and AND-ed into one fire-likelihood
//! mask:
//!
//! 1. HSV on a Gaussian-blurred copy (hue/saturation/value window)
//! 2. Red chroma (Cr of YCrCb) on the raw frame
//! 3. Perceptual lightness (L of Lab) on the raw frame
//!
//! All conversions produce 8-bit channels on the same scales OpenCV uses
//! (H in [0,180), S/V/Cr/L in [0,255]) so thresholds tuned against camera
//! footage carry over unchanged.

use std::sync::OnceLock;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, Mask};

pub const MASK_ON: u8 = 255;

/// Inclusive HSV window, 8-bit scales (H in [0,180)).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Thresholds for the segmentation cues.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CueThresholds {
    /// Gaussian kernel size for the HSV cue. Odd; 1 disables blurring.
    pub blur_kernel: u32,
    pub hsv: HsvRange,
    /// Keep pixels with Cr strictly above this value. `None` disables the cue.
    pub chroma_min: Option<u8>,
    /// Keep pixels with L strictly above this value. `None` disables the cue.
    pub lightness_min: Option<u8>,
    /// Square structuring element for closing. 0 or 1 disables closing.
    pub closing_kernel: u32,
}

impl Default for CueThresholds {
    fn default() -> Self {
        Self {
            blur_kernel: 7,
            hsv: HsvRange {
                lower: [5, 100, 180],
                upper: [30, 255, 255],
            },
            chroma_min: Some(160),
            lightness_min: Some(160),
            closing_kernel: 7,
        }
    }
}

/// Every intermediate raster of one segmentation pass.
pub struct SegmentationStages {
    pub blurred: RgbImage,
    pub color: Mask,
    pub heat: Option<Mask>,
    pub bright: Option<Mask>,
    /// AND of the enabled cues, before closing.
    pub combined: Mask,
    /// Closed mask; the pipeline's canonical output.
    pub fire_mask: Mask,
}

#[derive(Clone, Debug)]
pub struct ColorSpaceSegmenter {
    thresholds: CueThresholds,
}

impl ColorSpaceSegmenter {
    pub fn new(thresholds: CueThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &CueThresholds {
        &self.thresholds
    }

    /// Frame to closed fire mask.
    pub fn segment(&self, frame: &Frame) -> Mask {
        self.stages(frame).fire_mask
    }

    /// Run the full pass and keep every intermediate raster.
    pub fn stages(&self, frame: &Frame) -> SegmentationStages {
        let t = &self.thresholds;
        let raw = frame.as_image();

        let blurred = gaussian_blur(raw, t.blur_kernel);
        let color = threshold_rgb(&blurred, |p| t.hsv.contains(rgb_to_hsv8(p.0)));
        let heat = t
            .chroma_min
            .map(|min| threshold_rgb(raw, |p| rgb_to_cr8(p.0) > min));
        let bright = t
            .lightness_min
            .map(|min| threshold_rgb(raw, |p| rgb_to_lightness8(p.0) > min));

        let mut combined = color.clone();
        for cue in [&heat, &bright].into_iter().flatten() {
            and_in_place(&mut combined, cue);
        }

        let fire_mask = close(&combined, t.closing_kernel);

        SegmentationStages {
            blurred,
            color,
            heat,
            bright,
            combined,
            fire_mask,
        }
    }
}

/// Pixel-wise AND. `None` when dimensions differ.
pub fn mask_and(a: &Mask, b: &Mask) -> Option<Mask> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let mut out = a.clone();
    and_in_place(&mut out, b);
    Some(out)
}

/// Pixel-wise OR. `None` when dimensions differ.
pub fn mask_or(a: &Mask, b: &Mask) -> Option<Mask> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let mut out = a.clone();
    for (dst, src) in out.iter_mut().zip(b.iter()) {
        *dst = if *dst != 0 || *src != 0 { MASK_ON } else { 0 };
    }
    Some(out)
}

pub fn count_nonzero(mask: &Mask) -> u32 {
    mask.iter().filter(|&&v| v != 0).count() as u32
}

// Callers guarantee equal dimensions.
fn and_in_place(acc: &mut Mask, other: &Mask) {
    for (dst, src) in acc.iter_mut().zip(other.iter()) {
        *dst = if *dst != 0 && *src != 0 { MASK_ON } else { 0 };
    }
}

fn threshold_rgb<F>(image: &RgbImage, keep: F) -> Mask
where
    F: Fn(&Rgb<u8>) -> bool,
{
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if keep(image.get_pixel(x, y)) {
            Luma([MASK_ON])
        } else {
            Luma([0])
        }
    })
}

/// Sigma OpenCV derives for a kernel of `size` when none is given.
pub fn sigma_for_kernel(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_blur(image: &RgbImage, kernel: u32) -> RgbImage {
    if kernel <= 1 {
        return image.clone();
    }
    imageproc::filter::gaussian_blur_f32(image, sigma_for_kernel(kernel))
}

fn close(mask: &Mask, kernel: u32) -> Mask {
    if kernel <= 1 {
        return mask.clone();
    }
    let radius = (kernel / 2).min(u8::MAX as u32) as u8;
    imageproc::morphology::close(mask, Norm::LInf, radius)
}

/// RGB to 8-bit HSV: H in [0,180), S and V in [0,255].
pub fn rgb_to_hsv8(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let mut h = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }
    let h8 = ((h / 2.0).round() as u16 % 180) as u8;
    [h8, to_u8(s), max as u8]
}

/// Red-difference chroma of YCrCb.
pub fn rgb_to_cr8(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(f32::from);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    to_u8((r - y) * 0.713 + 128.0)
}

/// Lab lightness scaled to [0,255].
pub fn rgb_to_lightness8(rgb: [u8; 3]) -> u8 {
    let lut = srgb_linear_lut();
    let [r, g, b] = rgb.map(|c| lut[c as usize]);
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let l = if y > 0.008_856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    to_u8(l * 255.0 / 100.0)
}

fn srgb_linear_lut() -> &'static [f32; 256] {
    static LUT: OnceLock<[f32; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut lut = [0f32; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *slot = if c <= 0.040_45 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        lut
    })
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn solid_frame(w: u32, h: u32, color: [u8; 3]) -> Frame {
        Frame::from_image(RgbImage::from_pixel(w, h, Rgb(color))).unwrap()
    }

    fn random_mask(rng: &mut StdRng, w: u32, h: u32) -> Mask {
        GrayImage::from_fn(w, h, |_, _| {
            if rng.gen_bool(0.5) {
                Luma([MASK_ON])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn hsv_matches_opencv_scale() {
        assert_eq!(rgb_to_hsv8([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv8([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv8([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv8([0, 0, 0]), [0, 0, 0]);
        let [h, s, v] = rgb_to_hsv8([255, 160, 0]);
        assert_eq!((h, s, v), (19, 255, 255));
    }

    #[test]
    fn chroma_and_lightness_reference_points() {
        assert_eq!(rgb_to_cr8([128, 128, 128]), 128);
        assert!(rgb_to_cr8([255, 140, 0]) > 160);
        assert_eq!(rgb_to_lightness8([255, 255, 255]), 255);
        assert_eq!(rgb_to_lightness8([0, 0, 0]), 0);
        assert!(rgb_to_lightness8([255, 140, 0]) > 160);
    }

    #[test]
    fn black_frame_yields_empty_mask() {
        let seg = ColorSpaceSegmenter::new(CueThresholds::default());
        let mask = seg.segment(&solid_frame(32, 24, [0, 0, 0]));
        assert_eq!(mask.dimensions(), (32, 24));
        assert_eq!(count_nonzero(&mask), 0);
    }

    #[test]
    fn orange_frame_passes_all_cues() {
        let seg = ColorSpaceSegmenter::new(CueThresholds::default());
        let stages = seg.stages(&solid_frame(20, 20, [255, 140, 0]));
        assert_eq!(count_nonzero(&stages.color), 400);
        assert_eq!(count_nonzero(stages.heat.as_ref().unwrap()), 400);
        assert_eq!(count_nonzero(stages.bright.as_ref().unwrap()), 400);
        assert_eq!(count_nonzero(&stages.fire_mask), 400);
    }

    #[test]
    fn blue_and_skin_tones_are_rejected() {
        let seg = ColorSpaceSegmenter::new(CueThresholds::default());
        assert_eq!(count_nonzero(&seg.segment(&solid_frame(8, 8, [0, 0, 255]))), 0);
        // Skin tone sits inside the HSV window; the chroma cue rejects it.
        assert_eq!(count_nonzero(&seg.segment(&solid_frame(8, 8, [190, 140, 110]))), 0);
    }

    #[test]
    fn disabled_cues_are_skipped() {
        let thresholds = CueThresholds {
            chroma_min: None,
            lightness_min: None,
            closing_kernel: 0,
            ..CueThresholds::default()
        };
        let stages = ColorSpaceSegmenter::new(thresholds).stages(&solid_frame(4, 4, [255, 140, 0]));
        assert!(stages.heat.is_none());
        assert!(stages.bright.is_none());
        assert_eq!(stages.combined, stages.fire_mask);
    }

    #[test]
    fn and_is_commutative_and_associative() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_mask(&mut rng, 16, 9);
        let b = random_mask(&mut rng, 16, 9);
        let c = random_mask(&mut rng, 16, 9);

        let ab_c = mask_and(&mask_and(&a, &b).unwrap(), &c).unwrap();
        let a_bc = mask_and(&a, &mask_and(&b, &c).unwrap()).unwrap();
        let cb_a = mask_and(&mask_and(&c, &b).unwrap(), &a).unwrap();
        assert_eq!(ab_c, a_bc);
        assert_eq!(ab_c, cb_a);
        assert_eq!(mask_and(&a, &b), mask_and(&b, &a));
        assert_eq!(mask_or(&a, &b), mask_or(&b, &a));
    }

    #[test]
    fn mismatched_masks_do_not_combine() {
        let a = GrayImage::new(4, 4);
        let b = GrayImage::new(4, 5);
        assert!(mask_and(&a, &b).is_none());
        assert!(mask_or(&a, &b).is_none());
    }

    #[test]
    fn closing_fills_small_gaps() {
        let mut mask = GrayImage::from_pixel(21, 21, Luma([MASK_ON]));
        mask.put_pixel(10, 10, Luma([0]));
        mask.put_pixel(11, 10, Luma([0]));
        let closed = close(&mask, 7);
        assert_eq!(closed.get_pixel(10, 10)[0], MASK_ON);
        assert_eq!(closed.get_pixel(11, 10)[0], MASK_ON);
    }

    #[test]
    fn opencv_sigma_for_common_kernels() {
        assert!((sigma_for_kernel(7) - 1.4).abs() < 1e-6);
        assert!((sigma_for_kernel(21) - 3.5).abs() < 1e-6);
    }
}
