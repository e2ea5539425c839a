use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

// Detection

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ColorDistribution {
    pub red_mean: f64,
    pub green_mean: f64,
    pub blue_mean: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TextureAnalysis {
    pub smoothness: f64,
    pub uniformity: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageAnalysis {
    /// `[height, width, channels]`
    pub image_dimensions: [u32; 3],
    pub brightness: f64,
    pub contrast: f64,
    pub color_distribution: ColorDistribution,
    pub texture_analysis: TextureAnalysis,
    pub edge_density: f64,
    pub color_variation: f64,
    pub hue_variation: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DetectionResponse {
    pub prediction: String,
    pub predicted_class: String,
    pub confidence: f32,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub image_analysis: ImageAnalysis,
    pub class_probabilities: BTreeMap<String, f32>,
    pub mock_prediction: bool,
}

// Questionnaire

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QuestionnaireAnswer {
    pub question_id: String,
    #[serde(alias = "answer_text")]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QuestionnaireRequest {
    pub answers: Vec<QuestionnaireAnswer>,
    #[serde(default)]
    pub patient_info: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub additional_context: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DetailedInsights {
    pub risk_factors: Vec<String>,
    pub symptoms: Vec<String>,
    pub total_questions_answered: usize,
    pub yes_count: usize,
    pub symptom_severity: String,
    pub concerning_patterns: Vec<String>,
    #[serde(default)]
    pub symptom_categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub medical_follow_up: Vec<String>,
    #[serde(default)]
    pub monitoring: Vec<String>,
    pub ai_analysis: bool,
    pub strategy: String,
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AnalysisMetadata {
    pub questionnaire_id: String,
    pub analysis_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default)]
    pub parsing_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuestionnaireResponse {
    pub analysis: String,
    pub summary_paragraph: String,
    pub risk_level: RiskLevel,
    /// Human readable form of `risk_level`, e.g. "Your risk level is High".
    pub risk_assessment: String,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub confidence_score: f32,
    pub detailed_insights: DetailedInsights,
    pub patient_education: String,
    pub follow_up_questions: Vec<String>,
    pub metadata: AnalysisMetadata,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuickAnalysisResponse {
    pub risk_level: RiskLevel,
    pub risk_factors_count: usize,
    pub risk_factors: Vec<String>,
    pub symptoms_identified: Vec<String>,
    pub recommendation: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Question {
    pub id: String,
    pub text: String,
}

// Dentist search

fn default_country() -> String {
    "US".to_string()
}

fn default_radius_km() -> u32 {
    25
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DentistSearchRequest {
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_radius_km")]
    pub radius_km: u32,
    #[serde(default)]
    pub specialty: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DentistRecord {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub rating: f32,
    pub distance_km: f32,
    pub specialties: Vec<String>,
    pub website: String,
    pub availability: String,
    pub insurance_accepted: Vec<String>,
    pub reviews_count: u32,
    pub source: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SearchInfo {
    pub search_specialty: String,
    pub search_timestamp: String,
    pub coverage_area: String,
    pub live_search: bool,
    pub mock_data_used: bool,
    pub llm_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DentistSearchResponse {
    pub dentists: Vec<DentistRecord>,
    pub total_found: usize,
    pub search_location: String,
    pub search_radius: u32,
    pub recommendations: Vec<String>,
    pub additional_info: SearchInfo,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EmergencyService {
    pub name: String,
    pub phone: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UrgentCareCenter {
    pub name: String,
    pub description: String,
    pub hours: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EmergencyContacts {
    pub emergency_services: Vec<EmergencyService>,
    pub urgent_care_centers: Vec<UrgentCareCenter>,
    pub when_to_seek_emergency: Vec<String>,
}
