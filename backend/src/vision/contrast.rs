//! Contrast-limited adaptive histogram equalization on the lightness channel
//! of an 8-bit CIE L*a*b* image.
//!
//! Lab values use the usual 8-bit packing: L scaled to 0..=255 and a/b
//! offset by 128.

use image::{Rgb, RgbImage};

const HIST_SIZE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ContrastError {
    #[error("clip limit must be positive, got {0}")]
    ClipLimit(f32),
    #[error("tile grid must be at least 1x1")]
    TileGrid,
    #[error("image has no pixels")]
    Empty,
}

fn srgb_to_linear(c: u8) -> f32 {
    let v = c as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(v: f32) -> u8 {
    let v = v.clamp(0.0, 1.0);
    let s = if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round().clamp(0.0, 255.0) as u8
}

fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let t3 = t * t * t;
    if t3 > 0.008856 {
        t3
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

pub fn rgb_to_lab(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(srgb_to_linear);

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / 0.950_456;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / 1.088_754;

    let l = if y > 0.008856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (lab_f(x) - lab_f(y));
    let bb = 200.0 * (lab_f(y) - lab_f(z));

    [
        (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
        (a + 128.0).round().clamp(0.0, 255.0) as u8,
        (bb + 128.0).round().clamp(0.0, 255.0) as u8,
    ]
}

pub fn lab_to_rgb(lab: [u8; 3]) -> Rgb<u8> {
    let l = lab[0] as f32 * 100.0 / 255.0;
    let a = lab[1] as f32 - 128.0;
    let b = lab[2] as f32 - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let y = if l > 7.9996 { fy * fy * fy } else { l / 903.3 };
    let x = lab_f_inv(fx) * 0.950_456;
    let z = lab_f_inv(fz) * 1.088_754;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
    let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    Rgb([linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(bl)])
}

/// Equalizes `plane` (row-major, `width * height` bytes) in place.
pub fn clahe_plane(
    plane: &mut [u8],
    width: usize,
    height: usize,
    clip_limit: f32,
    grid: usize,
) -> Result<(), ContrastError> {
    if !(clip_limit > 0.0) {
        return Err(ContrastError::ClipLimit(clip_limit));
    }
    if grid == 0 {
        return Err(ContrastError::TileGrid);
    }
    if width == 0 || height == 0 || plane.len() != width * height {
        return Err(ContrastError::Empty);
    }

    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = vec![[0u8; HIST_SIZE]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts[ty * tiles_x + tx] = tile_lut(plane, width, (x0, y0, x1, y1), clip_limit);
        }
    }

    let source = plane.to_vec();
    for y in 0..height {
        let (ty1, ty2, ya) = neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx1, tx2, xa) = neighbours(x, tile_w, tiles_x);
            let v = source[y * width + x] as usize;

            let top = luts[ty1 * tiles_x + tx1][v] as f32 * (1.0 - xa)
                + luts[ty1 * tiles_x + tx2][v] as f32 * xa;
            let bottom = luts[ty2 * tiles_x + tx1][v] as f32 * (1.0 - xa)
                + luts[ty2 * tiles_x + tx2][v] as f32 * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            plane[y * width + x] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(())
}

/// Tile indices bracketing `pos` and the interpolation weight of the second.
fn neighbours(pos: usize, tile: usize, tiles: usize) -> (usize, usize, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    let first = f.floor();
    let weight = f - first;
    let last = tiles as isize - 1;
    let t1 = (first as isize).clamp(0, last) as usize;
    let t2 = (first as isize + 1).clamp(0, last) as usize;
    (t1, t2, weight)
}

fn tile_lut(
    plane: &[u8],
    width: usize,
    (x0, y0, x1, y1): (usize, usize, usize, usize),
    clip_limit: f32,
) -> [u8; HIST_SIZE] {
    let area = (x1 - x0) * (y1 - y0);
    let mut hist = [0usize; HIST_SIZE];
    for y in y0..y1 {
        for &v in &plane[y * width + x0..y * width + x1] {
            hist[v as usize] += 1;
        }
    }

    let clip = ((clip_limit * area as f32 / HIST_SIZE as f32) as usize).max(1);
    let mut clipped = 0usize;
    for h in hist.iter_mut() {
        if *h > clip {
            clipped += *h - clip;
            *h = clip;
        }
    }

    let batch = clipped / HIST_SIZE;
    let mut residual = clipped - batch * HIST_SIZE;
    for h in hist.iter_mut() {
        *h += batch;
    }
    if residual > 0 {
        let step = (HIST_SIZE / residual).max(1);
        let mut i = 0;
        while i < HIST_SIZE && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }

    let scale = (HIST_SIZE - 1) as f32 / area as f32;
    let mut lut = [0u8; HIST_SIZE];
    let mut sum = 0usize;
    for (i, h) in hist.iter().enumerate() {
        sum += h;
        lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Applies CLAHE to the L channel in Lab space and converts back to RGB.
pub fn clahe_rgb(image: &RgbImage, clip_limit: f32, grid: u32) -> Result<RgbImage, ContrastError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ContrastError::Empty);
    }

    let lab: Vec<[u8; 3]> = image.pixels().map(|p| rgb_to_lab(*p)).collect();
    let mut lightness: Vec<u8> = lab.iter().map(|p| p[0]).collect();

    clahe_plane(
        &mut lightness,
        width as usize,
        height as usize,
        clip_limit,
        grid as usize,
    )?;

    let mut out = RgbImage::new(width, height);
    for ((dst, src), l) in out.pixels_mut().zip(lab.iter()).zip(lightness) {
        *dst = lab_to_rgb([l, src[1], src[2]]);
    }
    Ok(out)
}
