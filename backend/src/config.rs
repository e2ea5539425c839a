use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheConfig {
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

/// Image preprocessing parameters. Defaults match the ImageNet statistics
/// the classifier was trained with. The input size is fixed by the network
/// and is not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub border_threshold: u8,
    pub clahe: ClaheConfig,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            border_threshold: 10,
            clahe: ClaheConfig::default(),
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

impl PreprocessConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path)?;
        let config: PreprocessConfig = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    pub positive_class: String,
    pub confidence_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/oral_cancer_checkpoint.pt"),
            positive_class: "Cancer".to_string(),
            confidence_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Process-wide settings, read once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    pub max_upload_bytes: usize,
    pub classifier: ClassifierConfig,
    pub preprocess: PreprocessConfig,
    pub llm: Option<LlmConfig>,
    pub search: Option<SearchConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            log_level: "info".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            classifier: ClassifierConfig::default(),
            preprocess: PreprocessConfig::default(),
            llm: None,
            search: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let preprocess = match get("PREPROCESS_CONFIG") {
            Some(path) => match PreprocessConfig::load(Path::new(&path)) {
                Ok(config) => {
                    log::info!("Loaded preprocessing config from {}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Ignoring preprocessing config {}: {}", path, e);
                    PreprocessConfig::default()
                }
            },
            None => PreprocessConfig::default(),
        };

        let classifier = ClassifierConfig {
            model_path: get("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.classifier.model_path),
            positive_class: get("POSITIVE_CLASS").unwrap_or(defaults.classifier.positive_class),
            confidence_threshold: parse_or(
                "CONFIDENCE_THRESHOLD",
                get("CONFIDENCE_THRESHOLD"),
                defaults.classifier.confidence_threshold,
            ),
        };

        let llm = get("LLM_API_KEY").or_else(|| get("AIMLAPI_KEY")).map(|api_key| LlmConfig {
            api_key,
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| "https://api.aimlapi.com/v1".to_string()),
            model: get("LLM_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            temperature: parse_or("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), 0.7),
            max_tokens: parse_or("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"), 1000),
        });

        let search = get("SERPAPI_KEY").map(|api_key| SearchConfig {
            api_key,
            base_url: get("SERPAPI_BASE_URL")
                .unwrap_or_else(|| "https://serpapi.com/search.json".to_string()),
        });

        Self {
            port: parse_or("PORT", get("PORT"), defaults.port),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), defaults.max_upload_bytes),
            classifier,
            preprocess,
            llm,
            search,
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.classifier.confidence_threshold, 0.7);
        assert_eq!(config.classifier.positive_class, "Cancer");
        assert_eq!(config.preprocess, PreprocessConfig::default());
        assert!(config.llm.is_none());
        assert!(config.search.is_none());
    }

    #[test]
    fn reads_external_service_settings() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AIMLAPI_KEY", "llm-key"),
            ("LLM_MODEL", "gpt-4o-mini"),
            ("LLM_MAX_TOKENS", "1500"),
            ("SERPAPI_KEY", "serp-key"),
            ("PORT", "9000"),
        ]));

        let llm = config.llm.expect("llm configured");
        assert_eq!(llm.api_key, "llm-key");
        assert_eq!(llm.model, "gpt-4o-mini");
        assert_eq!(llm.max_tokens, 1500);
        assert_eq!(llm.base_url, "https://api.aimlapi.com/v1");
        assert_eq!(config.search.expect("search configured").api_key, "serp-key");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("CONFIDENCE_THRESHOLD", "high"),
            ("LLM_API_KEY", ""),
        ]));
        assert_eq!(config.port, 8081);
        assert_eq!(config.classifier.confidence_threshold, 0.7);
        assert!(config.llm.is_none());
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = "border_threshold: 20\nclahe:\n  clip_limit: 3.0\n";
        let config: PreprocessConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.border_threshold, 20);
        assert_eq!(config.clahe.clip_limit, 3.0);
        assert_eq!(config.clahe.tile_grid, 8);
        assert_eq!(config.mean, [0.485, 0.456, 0.406]);
    }

    #[test]
    fn missing_preprocess_file_is_ignored() {
        let config = AppConfig::from_lookup(lookup(&[("PREPROCESS_CONFIG", "/nonexistent/preprocess.yaml")]));
        assert_eq!(config.preprocess, PreprocessConfig::default());
    }
}
