use serde::Deserialize;
use shared::QuestionnaireRequest;
use std::fmt::Write;

use crate::llm::strip_code_fences;

pub const SYSTEM_PROMPT: &str = "You are an expert oral health specialist and medical AI assistant. \
Your role is to analyze questionnaire responses and provide comprehensive, patient-friendly \
oral health assessments and recommendations.

Key responsibilities:
1. Analyze questionnaire responses for oral health risk factors
2. Identify symptoms and their potential significance
3. Assess overall risk level (Low, Medium, High)
4. Provide clear, actionable recommendations
5. Generate patient-friendly explanations
6. Suggest appropriate next steps
7. Create comprehensive patient education content

For patient education, provide detailed explanations about:
- The importance of oral health for overall well-being
- How oral health affects general health and quality of life
- Risk factors specific to the patient's responses
- General preventive care practices
- The importance of regular professional dental care
- Early detection and its benefits
- Self-care practices and their significance

Always maintain a professional, empathetic tone and provide evidence-based insights.
Use simple language that patients can easily understand.";

const RESPONSE_FORMAT: &str = r#"Please provide your analysis in the following JSON format:
{
    "analysis_summary": "Brief summary of the analysis in simple terms",
    "summary_paragraph": "One paragraph summarizing the patient's situation",
    "risk_assessment": {
        "level": "Low/Medium/High",
        "confidence": 0.0-1.0,
        "key_factors": ["list of main risk factors identified"]
    },
    "symptoms_analysis": {
        "primary_symptoms": ["list of main symptoms"],
        "symptom_severity": "Mild/Moderate/Severe",
        "concerning_patterns": ["any concerning symptom patterns"]
    },
    "recommendations": {
        "immediate_actions": ["urgent recommendations"],
        "lifestyle_changes": ["lifestyle recommendations"],
        "medical_follow_up": ["medical recommendations"]
    },
    "next_steps": ["specific actionable next steps for the patient"],
    "patient_education": "Comprehensive educational paragraph tailored to their specific responses",
    "follow_up_questions": ["questions to ask in follow-up"]
}"#;

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Renders the submission as readable text for the model.
pub fn format_questionnaire(request: &QuestionnaireRequest) -> String {
    let mut text = String::from("=== ORAL HEALTH QUESTIONNAIRE RESPONSES ===\n\n");

    if !request.patient_info.is_empty() {
        text.push_str("Patient Information:\n");
        for (key, value) in &request.patient_info {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(text, "- {}: {}", title_case(key), value);
        }
        text.push('\n');
    }

    text.push_str("Questionnaire Responses:\n");
    for (i, answer) in request.answers.iter().enumerate() {
        let question = answer
            .question_text
            .clone()
            .unwrap_or_else(|| format!("Question {}", answer.question_id));
        let _ = write!(text, "{}. {}\n   Answer: {}\n\n", i + 1, question, answer.answer);
    }

    if let Some(context) = request.additional_context.as_deref().filter(|c| !c.trim().is_empty()) {
        let _ = write!(text, "Additional Context:\n{}\n\n", context);
    }
    text
}

pub fn user_prompt(request: &QuestionnaireRequest) -> String {
    format!(
        "Please analyze the following oral health questionnaire responses and provide a comprehensive assessment:\n\n{}\n{}",
        format_questionnaire(request),
        RESPONSE_FORMAT
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LlmRisk {
    pub level: String,
    pub confidence: Option<f32>,
    pub key_factors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LlmSymptoms {
    pub primary_symptoms: Vec<String>,
    pub symptom_severity: String,
    pub concerning_patterns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LlmRecommendations {
    pub immediate_actions: Vec<String>,
    pub lifestyle_changes: Vec<String>,
    pub medical_follow_up: Vec<String>,
}

/// Structured analysis requested from the model. Every field is optional
/// on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LlmAnalysis {
    pub analysis_summary: String,
    pub summary_paragraph: Option<String>,
    pub risk_assessment: LlmRisk,
    pub symptoms_analysis: LlmSymptoms,
    pub recommendations: LlmRecommendations,
    pub next_steps: Vec<String>,
    pub patient_education: Option<String>,
    pub follow_up_questions: Vec<String>,
}

pub fn parse_analysis(raw: &str) -> Result<LlmAnalysis, serde_json::Error> {
    serde_json::from_str(strip_code_fences(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::QuestionnaireAnswer;
    use std::collections::BTreeMap;

    fn request() -> QuestionnaireRequest {
        let mut patient_info = BTreeMap::new();
        patient_info.insert("age_group".to_string(), serde_json::json!("40-50"));
        patient_info.insert("smoker".to_string(), serde_json::json!(false));
        QuestionnaireRequest {
            answers: vec![
                QuestionnaireAnswer {
                    question_id: "q1".into(),
                    answer: "yes".into(),
                    question_text: Some("Do you have any sores or ulcers in your mouth?".into()),
                },
                QuestionnaireAnswer {
                    question_id: "q2".into(),
                    answer: "no".into(),
                    question_text: None,
                },
            ],
            patient_info,
            additional_context: Some("Recently started a new medication".into()),
        }
    }

    #[test]
    fn formats_answers_and_context() {
        let text = format_questionnaire(&request());
        assert!(text.contains("- Age Group: 40-50\n"));
        assert!(text.contains("- Smoker: false\n"));
        assert!(text.contains("1. Do you have any sores or ulcers in your mouth?\n   Answer: yes"));
        assert!(text.contains("2. Question q2\n   Answer: no"));
        assert!(text.contains("Additional Context:\nRecently started a new medication"));
    }

    #[test]
    fn prompt_asks_for_json() {
        let prompt = user_prompt(&request());
        assert!(prompt.contains("\"analysis_summary\""));
        assert!(prompt.contains("=== ORAL HEALTH QUESTIONNAIRE RESPONSES ==="));
    }

    #[test]
    fn parses_fenced_partial_json() {
        let raw = "```json\n{\"analysis_summary\": \"ok\", \"risk_assessment\": {\"level\": \"High\", \"confidence\": 0.9}}\n```";
        let parsed = parse_analysis(raw).unwrap();
        assert_eq!(parsed.analysis_summary, "ok");
        assert_eq!(parsed.risk_assessment.level, "High");
        assert_eq!(parsed.risk_assessment.confidence, Some(0.9));
        assert!(parsed.next_steps.is_empty());
        assert!(parsed.patient_education.is_none());
    }

    #[test]
    fn prose_does_not_parse() {
        assert!(parse_analysis("I think the patient is fine.").is_err());
    }
}
