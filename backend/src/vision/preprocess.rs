use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array4, ArrayView4};

use super::contrast::{clahe_rgb, ContrastError};
use crate::config::PreprocessConfig;

/// Side length the classifier expects.
pub const INPUT_SIZE: u32 = 224;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Image is empty after border removal")]
    EmptyImage,
    #[error("Contrast enhancement failed: {0}")]
    Contrast(#[from] ContrastError),
}

/// Batched CHW float tensor, `[1, 3, INPUT_SIZE, INPUT_SIZE]` out of the pipeline.
#[derive(Debug, Clone)]
pub struct PreprocessedTensor {
    data: Array4<f32>,
    normalized: bool,
}

impl PreprocessedTensor {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Whether mean/std normalization was applied (false on the fallback path).
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

pub fn gray_value(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Crops to the bounding box of pixels brighter than `threshold`.
/// Returns the image unchanged when nothing passes the threshold.
pub fn remove_dark_border(image: &RgbImage, threshold: u8) -> RgbImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in image.enumerate_pixels() {
        if gray_value(p[0], p[1], p[2]) > threshold {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }

    match bounds {
        Some((x0, y0, x1, y1)) => {
            imageops::crop_imm(image, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
        }
        None => image.clone(),
    }
}

pub fn apply_clahe(image: &RgbImage, clip_limit: f32, grid: u32) -> Result<RgbImage, PreprocessError> {
    Ok(clahe_rgb(image, clip_limit, grid)?)
}

pub fn to_tensor(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> PreprocessedTensor {
    let (width, height) = image.dimensions();
    let data = Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, c, y, x)| {
            let v = image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (v - mean[c]) / std[c]
        },
    );
    PreprocessedTensor {
        data,
        normalized: true,
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn size(&self) -> u32 {
        INPUT_SIZE
    }

    /// Full pipeline with a resize-and-scale fallback; never fails.
    pub fn run(&self, image: &RgbImage) -> PreprocessedTensor {
        match self.enhance_and_normalize(image) {
            Ok(tensor) => tensor,
            Err(e) => {
                log::error!("Error in preprocessing: {}", e);
                log::warn!("Falling back to simple resize preprocessing");
                self.simple(image)
            }
        }
    }

    fn enhance_and_normalize(&self, image: &RgbImage) -> Result<PreprocessedTensor, PreprocessError> {
        let cropped = remove_dark_border(image, self.config.border_threshold);
        if cropped.width() == 0 || cropped.height() == 0 {
            return Err(PreprocessError::EmptyImage);
        }

        let clahe = &self.config.clahe;
        let enhanced = apply_clahe(&cropped, clahe.clip_limit, clahe.tile_grid)?;
        let size = INPUT_SIZE;
        let resized = imageops::resize(&enhanced, size, size, FilterType::Triangle);

        Ok(to_tensor(&resized, self.config.mean, self.config.std))
    }

    fn simple(&self, image: &RgbImage) -> PreprocessedTensor {
        let size = INPUT_SIZE;
        let resized = if image.width() == 0 || image.height() == 0 {
            RgbImage::new(size, size)
        } else {
            imageops::resize(image, size, size, FilterType::Triangle)
        };
        let mut tensor = to_tensor(&resized, [0.0; 3], [1.0; 3]);
        tensor.normalized = false;
        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClaheConfig;
    use image::Rgb;

    fn framed_image() -> RgbImage {
        // 40x30 black frame around a 20x10 textured patch starting at (12, 8)
        RgbImage::from_fn(40, 30, |x, y| {
            if (12..32).contains(&x) && (8..18).contains(&y) {
                Rgb([120 + (x as u8 % 7) * 10, 60, 80 + (y as u8 % 5) * 12])
            } else {
                Rgb([3, 3, 3])
            }
        })
    }

    #[test]
    fn border_removal_crops_to_content() {
        let cropped = remove_dark_border(&framed_image(), 10);
        assert_eq!(cropped.dimensions(), (20, 10));
        assert_eq!(cropped.get_pixel(0, 0), framed_image().get_pixel(12, 8));
    }

    #[test]
    fn all_dark_image_is_left_alone() {
        let dark = RgbImage::from_pixel(16, 16, Rgb([5, 5, 5]));
        assert_eq!(remove_dark_border(&dark, 10).dimensions(), (16, 16));
    }

    #[test]
    fn pipeline_produces_normalized_fixed_shape() {
        let tensor = Preprocessor::new(PreprocessConfig::default()).run(&framed_image());
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        assert!(tensor.is_normalized());
        assert!(tensor.view().iter().all(|v| v.is_finite()));
        // (0 - 0.485) / 0.229 is the smallest reachable value
        assert!(tensor.view().iter().all(|&v| v >= -2.2 && v <= 2.7));
    }

    #[test]
    fn invalid_contrast_settings_fall_back_to_simple_path() {
        let config = PreprocessConfig {
            clahe: ClaheConfig {
                clip_limit: -1.0,
                tile_grid: 8,
            },
            ..PreprocessConfig::default()
        };
        let image = RgbImage::from_pixel(10, 10, Rgb([255, 0, 51]));
        let tensor = Preprocessor::new(config).run(&image);

        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        assert!(!tensor.is_normalized());
        let view = tensor.view();
        assert!((view[[0, 0, 5, 5]] - 1.0).abs() < 0.01);
        assert!(view[[0, 1, 5, 5]].abs() < 0.01);
        assert!((view[[0, 2, 5, 5]] - 0.2).abs() < 0.01);
    }

    #[test]
    fn yaml_size_override_cannot_change_shape() {
        let config: PreprocessConfig = serde_yaml::from_str("size: 0\nborder_threshold: 10\n").unwrap();
        let tensor = Preprocessor::new(config).run(&framed_image());
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn tensor_uses_channel_statistics() {
        let image = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        let tensor = to_tensor(&image, [0.5, 0.5, 0.5], [0.5, 0.25, 0.5]);
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        assert!((tensor.view()[[0, 0, 1, 1]] - 1.0).abs() < 1e-6);
        assert!((tensor.view()[[0, 1, 0, 0]] - 2.0).abs() < 1e-6);
        assert_eq!(tensor.to_vec().len(), 12);
    }
}
