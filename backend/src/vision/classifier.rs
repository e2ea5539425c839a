use rand::Rng;
use shared::RiskLevel;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::preprocess::PreprocessedTensor;
use crate::config::ClassifierConfig;

const DEFAULT_CLASSES: [&str; 2] = ["Non-Cancer", "Cancer"];
const MOCK_RANGE: std::ops::Range<f32> = 0.3..0.95;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model checkpoint not found at {0}")]
    CheckpointMissing(PathBuf),
    #[error("Model error: {0}")]
    Model(String),
    #[cfg(feature = "torch")]
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),
    #[error("Expected {expected} logits, model returned {got}")]
    OutputShape { expected: usize, got: usize },
    #[error("Model returned non-finite logits")]
    NonFinite,
}

/// A network that maps a preprocessed batch to one row of class logits.
pub trait Backbone: Send + Sync {
    fn forward(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError>;
}

/// Two class names and which index is the positive (lesion) class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMap {
    names: [String; 2],
    positive: usize,
}

impl ClassMap {
    pub fn resolve(class_names: Option<Vec<String>>, positive_label: &str) -> Self {
        let names: [String; 2] = match class_names {
            Some(names) if names.len() == 2 => [names[0].clone(), names[1].clone()],
            Some(names) => {
                log::warn!(
                    "Checkpoint lists {} classes, expected 2; using default class names",
                    names.len()
                );
                DEFAULT_CLASSES.map(String::from)
            }
            None => DEFAULT_CLASSES.map(String::from),
        };
        let positive = names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(positive_label))
            .unwrap_or(1);
        Self { names, positive }
    }

    pub fn positive(&self) -> usize {
        self.positive
    }

    pub fn negative(&self) -> usize {
        1 - self.positive
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    fn outcome(&self, index: usize) -> Outcome {
        if index == self.positive {
            Outcome::Positive
        } else {
            Outcome::Negative
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Negative,
    Positive,
}

impl Outcome {
    pub fn risk_level(self) -> RiskLevel {
        match self {
            Outcome::Negative => RiskLevel::Low,
            Outcome::Positive => RiskLevel::High,
        }
    }

    pub fn recommendations(self) -> Vec<String> {
        let items: &[&str] = match self {
            Outcome::Negative => &[
                "Continue regular oral hygiene practices",
                "Schedule routine dental check-ups every 6 months",
                "Monitor for any changes in oral tissues",
                "Maintain healthy lifestyle habits",
                "Avoid tobacco and excessive alcohol consumption",
            ],
            Outcome::Positive => &[
                "IMMEDIATE consultation with an oral cancer specialist required",
                "Consider biopsy for definitive diagnosis",
                "Avoid tobacco and alcohol consumption completely",
                "Schedule follow-up appointment within 1 week",
                "Consider second opinion from another specialist",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub label: String,
    pub outcome: Outcome,
    pub confidence: f32,
    pub probabilities: BTreeMap<String, f32>,
    pub mock: bool,
}

impl ClassificationResult {
    pub fn risk_level(&self) -> RiskLevel {
        self.outcome.risk_level()
    }

    pub fn prediction(&self) -> String {
        match self.outcome {
            Outcome::Negative => format!("{} - No signs of oral cancer detected", self.label),
            Outcome::Positive => format!(
                "{} - Suspicious lesions detected that may indicate oral cancer",
                self.label
            ),
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        self.outcome.recommendations()
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Lesion classifier. Without a backbone it runs in mock mode and draws
/// its confidence at random.
pub struct LesionClassifier {
    backbone: Option<Box<dyn Backbone>>,
    classes: ClassMap,
    threshold: f32,
}

impl LesionClassifier {
    pub fn load(config: &ClassifierConfig) -> Self {
        #[cfg(feature = "torch")]
        {
            match super::torch::TorchBackbone::load(&config.model_path) {
                Ok(backbone) => {
                    log::info!("Model loaded from {}", config.model_path.display());
                    let class_names = backbone.class_names();
                    return Self::with_backbone(Box::new(backbone), class_names, config);
                }
                Err(e) => {
                    log::error!("Failed to load model: {}", e);
                }
            }
        }
        #[cfg(not(feature = "torch"))]
        log::warn!(
            "Built without torch support, ignoring checkpoint {}",
            config.model_path.display()
        );

        log::warn!("Classifier running in mock mode");
        Self::mock(config)
    }

    pub fn with_backbone(
        backbone: Box<dyn Backbone>,
        class_names: Option<Vec<String>>,
        config: &ClassifierConfig,
    ) -> Self {
        let classes = ClassMap::resolve(class_names, &config.positive_class);
        log::info!(
            "Classes: {} (negative), {} (positive)",
            classes.name(classes.negative()),
            classes.name(classes.positive())
        );
        Self {
            backbone: Some(backbone),
            classes,
            threshold: config.confidence_threshold,
        }
    }

    pub fn mock(config: &ClassifierConfig) -> Self {
        Self {
            backbone: None,
            classes: ClassMap::resolve(None, &config.positive_class),
            threshold: config.confidence_threshold,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.backbone.is_none()
    }

    /// Never fails: inference errors degrade to a mock prediction.
    pub fn classify(&self, input: &PreprocessedTensor) -> ClassificationResult {
        let Some(backbone) = &self.backbone else {
            log::warn!("Model not loaded, using mock prediction");
            return self.mock_prediction();
        };

        match self.infer(backbone.as_ref(), input) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Error during model inference: {}", e);
                log::warn!("Falling back to mock prediction");
                self.mock_prediction()
            }
        }
    }

    fn infer(
        &self,
        backbone: &dyn Backbone,
        input: &PreprocessedTensor,
    ) -> Result<ClassificationResult, InferenceError> {
        let logits = backbone.forward(input)?;
        if logits.len() != 2 {
            return Err(InferenceError::OutputShape {
                expected: 2,
                got: logits.len(),
            });
        }
        if logits.iter().any(|l| !l.is_finite()) {
            return Err(InferenceError::NonFinite);
        }
        log::debug!("Raw model outputs: {:?}", logits);

        let probabilities = softmax(&logits);
        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        let label = self.classes.name(index).to_string();
        log::info!("Predicted class: {} ({}) confidence {:.4}", index, label, confidence);

        Ok(ClassificationResult {
            label,
            outcome: self.classes.outcome(index),
            confidence,
            probabilities: (0..2)
                .map(|i| (self.classes.name(i).to_string(), probabilities[i]))
                .collect(),
            mock: false,
        })
    }

    fn mock_prediction(&self) -> ClassificationResult {
        let draw = rand::rng().random_range(MOCK_RANGE);
        log::info!("Mock confidence: {:.3}", draw);
        self.mock_prediction_with(draw)
    }

    /// Mock output for a given confidence draw; positive above the threshold.
    pub fn mock_prediction_with(&self, draw: f32) -> ClassificationResult {
        let draw = draw.clamp(0.0, 1.0);
        let index = if draw > self.threshold {
            self.classes.positive()
        } else {
            self.classes.negative()
        };
        let other = 1 - index;

        let mut probabilities = BTreeMap::new();
        probabilities.insert(self.classes.name(index).to_string(), draw);
        probabilities.insert(self.classes.name(other).to_string(), 1.0 - draw);

        ClassificationResult {
            label: self.classes.name(index).to_string(),
            outcome: self.classes.outcome(index),
            confidence: draw,
            probabilities,
            mock: true,
        }
    }
}
