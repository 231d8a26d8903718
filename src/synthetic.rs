//! Synthetic scenes for tests, demos and calibration.
//!
//! Flames are painted as a crown: three narrow spikes over a body, with noisy
//! orange-yellow pixels and a few dark soot flecks inside. That yields the
//! irregular outline, texture and internal edges real flames show. Discs are
//! smooth and uniform, the classic false positive for color-only detection.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SCENE_WIDTH: u32 = 320;
pub const SCENE_HEIGHT: u32 = 240;
/// Flame blobs fill a square of this side.
pub const FLAME_SIZE: u32 = 60;
pub const DISC_COLOR: Rgb<u8> = Rgb([255, 140, 0]);

const SPIKES: u32 = 3;
const SPIKE_HEIGHT: u32 = 30;
const SOOT_SIZE: u32 = 5;
const SOOT_X: [u32; 4] = [8, 20, 32, 44];
const SOOT_Y: [u32; 2] = [36, 46];

pub fn black(width: u32, height: u32) -> RgbImage {
    RgbImage::new(width, height)
}

fn in_flame(dx: u32, dy: u32) -> bool {
    if dx >= FLAME_SIZE || dy >= FLAME_SIZE {
        return false;
    }
    if dy >= SPIKE_HEIGHT {
        return true;
    }
    let spike_width = FLAME_SIZE / SPIKES;
    let center = (dx / spike_width) * spike_width + spike_width / 2;
    let half = dy * (spike_width / 2) / SPIKE_HEIGHT;
    dx.abs_diff(center) <= half
}

fn in_soot(dx: u32, dy: u32) -> bool {
    SOOT_X.iter().any(|&sx| (sx..sx + SOOT_SIZE).contains(&dx))
        && SOOT_Y.iter().any(|&sy| (sy..sy + SOOT_SIZE).contains(&dy))
}

/// Paint one flame with its top-left corner at `(x0, y0)`. Pixels falling
/// outside the canvas are skipped.
pub fn paint_flame(img: &mut RgbImage, x0: u32, y0: u32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for dy in 0..FLAME_SIZE {
        for dx in 0..FLAME_SIZE {
            if !in_flame(dx, dy) {
                continue;
            }
            let (x, y) = (x0 + dx, y0 + dy);
            if x >= img.width() || y >= img.height() {
                continue;
            }
            let px = if in_soot(dx, dy) {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, rng.gen_range(120..=200), rng.gen_range(0..=20)])
            };
            img.put_pixel(x, y, px);
        }
    }
}

/// Paint a filled disc of uniform `color`.
pub fn paint_disc(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    let r2 = radius * radius;
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
        if dx * dx + dy * dy <= r2 {
            *px = color;
        }
    }
}

/// One flame on a black background.
pub fn single_flame_scene(seed: u64) -> RgbImage {
    let mut img = black(SCENE_WIDTH, SCENE_HEIGHT);
    paint_flame(&mut img, 40, 60, seed);
    img
}

/// Two flames far enough apart to stay separate regions.
pub fn twin_flame_scene(seed: u64) -> RgbImage {
    let mut img = black(SCENE_WIDTH, SCENE_HEIGHT);
    paint_flame(&mut img, 40, 60, seed);
    paint_flame(&mut img, 200, 80, seed.wrapping_add(1));
    img
}

/// A smooth orange disc; fire-colored but compact and textureless.
pub fn disc_scene() -> RgbImage {
    let mut img = black(SCENE_WIDTH, SCENE_HEIGHT);
    paint_disc(&mut img, 160, 120, 40, DISC_COLOR);
    img
}
