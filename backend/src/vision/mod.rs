pub mod classifier;
pub mod contrast;
pub mod features;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

use image::RgbImage;
use shared::DetectionResponse;
use std::time::Instant;

use crate::config::AppConfig;
use classifier::LesionClassifier;
use preprocess::Preprocessor;

fn round3(v: f32) -> f32 {
    (v * 1000.0).round() / 1000.0
}

/// Preprocess, classify and describe one uploaded image.
pub struct DetectionService {
    preprocessor: Preprocessor,
    classifier: LesionClassifier,
    max_upload_bytes: usize,
}

impl DetectionService {
    pub fn new(preprocessor: Preprocessor, classifier: LesionClassifier, max_upload_bytes: usize) -> Self {
        Self {
            preprocessor,
            classifier,
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Preprocessor::new(config.preprocess.clone()),
            LesionClassifier::load(&config.classifier),
            config.max_upload_bytes,
        )
    }

    pub fn is_mock(&self) -> bool {
        self.classifier.is_mock()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn analyze(&self, image: &RgbImage) -> DetectionResponse {
        let start = Instant::now();
        log::debug!("Input image {}x{}", image.width(), image.height());

        let tensor = self.preprocessor.run(image);
        log::debug!(
            "Preprocessed to {:?} ({}x{} target, normalized={}) in {:?}",
            tensor.shape(),
            self.preprocessor.size(),
            self.preprocessor.size(),
            tensor.is_normalized(),
            start.elapsed()
        );

        let result = self.classifier.classify(&tensor);
        let image_analysis = features::analyze_image(image);

        log::info!(
            "Prediction: {} risk={} confidence={:.3} mock={} in {:?}",
            result.label,
            result.risk_level(),
            result.confidence,
            result.mock,
            start.elapsed()
        );

        DetectionResponse {
            prediction: result.prediction(),
            predicted_class: result.label.clone(),
            confidence: round3(result.confidence),
            risk_level: result.risk_level(),
            recommendations: result.recommendations(),
            image_analysis,
            class_probabilities: result
                .probabilities
                .iter()
                .map(|(name, p)| (name.clone(), round3(*p)))
                .collect(),
            mock_prediction: result.mock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierConfig, PreprocessConfig};
    use image::Rgb;
    use shared::RiskLevel;

    #[test]
    fn mock_service_returns_complete_response() {
        let service = DetectionService::new(
            Preprocessor::new(PreprocessConfig::default()),
            LesionClassifier::mock(&ClassifierConfig::default()),
            1024,
        );
        let image = RgbImage::from_fn(48, 32, |x, y| Rgb([(x * 5) as u8, (y * 7) as u8, 90]));
        let response = service.analyze(&image);

        assert!(response.mock_prediction);
        assert!(matches!(response.risk_level, RiskLevel::Low | RiskLevel::High));
        assert!((0.0..=1.0).contains(&response.confidence));
        assert_eq!(response.recommendations.len(), 5);
        assert_eq!(response.image_analysis.image_dimensions, [32, 48, 3]);
        assert_eq!(response.class_probabilities.len(), 2);
        let total: f32 = response.class_probabilities.values().sum();
        assert!((total - 1.0).abs() < 0.002);
    }

    #[test]
    fn confidence_is_rounded() {
        assert_eq!(round3(0.123456), 0.123);
        assert_eq!(round3(0.9996), 1.0);
    }
}
