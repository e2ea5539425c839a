//! Descriptive statistics over the raw upload, reported next to the
//! classifier output. Independent of the model.

use image::RgbImage;
use shared::{ColorDistribution, ImageAnalysis, TextureAnalysis};
use std::collections::VecDeque;

use super::preprocess::gray_value;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Single-channel plane with reflect-101 border access.
struct Plane<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Copy> Plane<T> {
    fn at(&self, x: isize, y: isize) -> T {
        let x = reflect101(x, self.width);
        let y = reflect101(y, self.height);
        self.data[y * self.width + x]
    }
}

fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    while i < 0 || i >= n {
        i = if i < 0 { -i } else { 2 * (n - 1) - i };
    }
    i as usize
}

fn mean_std<I: Iterator<Item = f64> + Clone>(values: I) -> (f64, f64) {
    let mut count = 0usize;
    let mut sum = 0.0;
    for v in values.clone() {
        sum += v;
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
    (mean, var.sqrt())
}

fn grayscale(image: &RgbImage) -> Plane<u8> {
    Plane {
        data: image.pixels().map(|p| gray_value(p[0], p[1], p[2])).collect(),
        width: image.width() as usize,
        height: image.height() as usize,
    }
}

/// Variance of the 4-neighbour Laplacian response.
fn laplacian_variance(gray: &Plane<u8>) -> f64 {
    let mut responses = Vec::with_capacity(gray.data.len());
    for y in 0..gray.height as isize {
        for x in 0..gray.width as isize {
            let v = gray.at(x - 1, y) as f64
                + gray.at(x + 1, y) as f64
                + gray.at(x, y - 1) as f64
                + gray.at(x, y + 1) as f64
                - 4.0 * gray.at(x, y) as f64;
            responses.push(v);
        }
    }
    let (_, std) = mean_std(responses.iter().copied());
    std * std
}

/// Sum of squared counts over a 256-bin histogram spanning the observed range.
fn histogram_uniformity(gray: &Plane<u8>) -> f64 {
    let (Some(&lo), Some(&hi)) = (gray.data.iter().min(), gray.data.iter().max()) else {
        return 0.0;
    };
    if lo == hi {
        let n = gray.data.len() as f64;
        return n * n;
    }
    let mut bins = [0u64; 256];
    let span = (hi - lo) as f64;
    for &v in &gray.data {
        let idx = (((v - lo) as f64 / span) * 256.0) as usize;
        bins[idx.min(255)] += 1;
    }
    bins.iter().map(|&c| (c * c) as f64).sum()
}

/// Fraction of pixels marked as edges by a Canny detector
/// (3x3 Sobel, L1 magnitude, non-maximum suppression, hysteresis).
fn edge_density(gray: &Plane<u8>) -> f64 {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    if edges.is_empty() {
        return 0.0;
    }
    edges.iter().filter(|&&e| e).count() as f64 / edges.len() as f64
}

fn canny(gray: &Plane<u8>, low: f32, high: f32) -> Vec<bool> {
    let (w, h) = (gray.width, gray.height);
    let mut dx = vec![0f32; w * h];
    let mut dy = vec![0f32; w * h];
    let mut mag = vec![0f32; w * h];

    for y in 0..h as isize {
        for x in 0..w as isize {
            let p = |ox: isize, oy: isize| gray.at(x + ox, y + oy) as f32;
            let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            let i = y as usize * w + x as usize;
            dx[i] = gx;
            dy[i] = gy;
            mag[i] = gx.abs() + gy.abs();
        }
    }

    let mag_at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            mag[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut class = vec![0u8; w * h];
    let mut queue = VecDeque::new();
    let tan22 = (22.5f32).to_radians().tan();
    let tan67 = (67.5f32).to_radians().tan();

    for y in 0..h as isize {
        for x in 0..w as isize {
            let i = y as usize * w + x as usize;
            let m = mag[i];
            if m <= low {
                continue;
            }
            let (ax, ay) = (dx[i].abs(), dy[i].abs());
            let is_max = if ay < ax * tan22 {
                m > mag_at(x - 1, y) && m >= mag_at(x + 1, y)
            } else if ay > ax * tan67 {
                m > mag_at(x, y - 1) && m >= mag_at(x, y + 1)
            } else {
                let s: isize = if (dx[i] < 0.0) != (dy[i] < 0.0) { -1 } else { 1 };
                m > mag_at(x - s, y - 1) && m > mag_at(x + s, y + 1)
            };
            if !is_max {
                continue;
            }
            if m > high {
                class[i] = 2;
                queue.push_back((x, y));
            } else {
                class[i] = 1;
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for oy in -1..=1 {
            for ox in -1..=1 {
                let (nx, ny) = (x + ox, y + oy);
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if class[j] == 1 {
                    class[j] = 2;
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    class.into_iter().map(|c| c == 2).collect()
}

/// 8-bit HSV as OpenCV packs it: hue in 0..180, saturation in 0..=255.
fn hue_saturation(r: u8, g: u8, b: u8) -> (f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;
    let s = if v == 0.0 { 0.0 } else { (diff * 255.0 / v).round() };
    if diff == 0.0 {
        return (0.0, s);
    }
    let mut h = if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    ((h / 2.0).round() % 180.0, s)
}

pub fn analyze_image(image: &RgbImage) -> ImageAnalysis {
    let gray = grayscale(image);
    let (brightness, contrast) = mean_std(gray.data.iter().map(|&v| v as f64));

    let channel = |c: usize| mean_std(image.pixels().map(move |p| p[c] as f64)).0;
    let hs: Vec<(f64, f64)> = image
        .pixels()
        .map(|p| hue_saturation(p[0], p[1], p[2]))
        .collect();
    let (_, hue_variation) = mean_std(hs.iter().map(|&(h, _)| h));
    let (_, color_variation) = mean_std(hs.iter().map(|&(_, s)| s));

    ImageAnalysis {
        image_dimensions: [image.height(), image.width(), 3],
        brightness,
        contrast,
        color_distribution: ColorDistribution {
            red_mean: channel(0),
            green_mean: channel(1),
            blue_mean: channel(2),
        },
        texture_analysis: TextureAnalysis {
            smoothness: laplacian_variance(&gray),
            uniformity: histogram_uniformity(&gray),
        },
        edge_density: edge_density(&gray),
        color_variation,
        hue_variation,
    }
}
