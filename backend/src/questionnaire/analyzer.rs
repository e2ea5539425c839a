use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shared::{
    AnalysisMetadata, DetailedInsights, QuestionnaireAnswer, QuestionnaireRequest, QuestionnaireResponse,
    QuickAnalysisResponse, RiskLevel,
};
use std::str::FromStr;
use thiserror::Error;

use super::prompt::{self, LlmAnalysis};
use super::rules::{self, RuleAssessment, SymptomAnalysis};
use crate::config::LlmConfig;
use crate::llm::{ChatClient, ChatMessage, LlmError};

const RULE_CONFIDENCE: f32 = 0.8;
const FALLBACK_CONFIDENCE: f32 = 0.6;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("No answers provided")]
    NoAnswers,
    #[error("Answer {0} is missing question_id")]
    MissingQuestionId(usize),
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("No analysis strategy succeeded: {0}")]
    Exhausted(String),
}

pub fn validate(answers: &[QuestionnaireAnswer]) -> Result<(), ValidationError> {
    if answers.is_empty() {
        return Err(ValidationError::NoAnswers);
    }
    if let Some(i) = answers.iter().position(|a| a.question_id.trim().is_empty()) {
        return Err(ValidationError::MissingQuestionId(i));
    }
    Ok(())
}

/// Stable id for a set of answers: `q_` plus 16 hex chars of their sha256.
/// Each field is length-prefixed so no two answer lists share an encoding.
pub fn questionnaire_id(answers: &[QuestionnaireAnswer]) -> String {
    let mut hasher = Sha256::new();
    for answer in answers {
        for field in [&answer.question_id, &answer.answer] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    let digest = hex::encode(hasher.finalize());
    format!("q_{}", &digest[..16])
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// A validated request with the rule facts every strategy builds on.
pub struct Submission<'a> {
    pub request: &'a QuestionnaireRequest,
    pub questionnaire_id: String,
    pub rules: RuleAssessment,
    pub symptoms: SymptomAnalysis,
}

impl<'a> Submission<'a> {
    pub fn new(request: &'a QuestionnaireRequest) -> Self {
        Self {
            request,
            questionnaire_id: questionnaire_id(&request.answers),
            rules: rules::assess_risk(&request.answers),
            symptoms: rules::analyze_symptoms(&request.answers),
        }
    }

    fn metadata(&self, model_used: Option<String>) -> AnalysisMetadata {
        AnalysisMetadata {
            questionnaire_id: self.questionnaire_id.clone(),
            analysis_timestamp: timestamp(),
            model_used,
            parsing_error: false,
            raw_response: None,
        }
    }

    fn insights(&self, strategy: &str, risk_factors: Vec<String>, symptoms: Vec<String>, ai: bool) -> DetailedInsights {
        DetailedInsights {
            risk_factors,
            symptoms,
            total_questions_answered: self.request.answers.len(),
            yes_count: self.rules.yes_count,
            symptom_severity: self.symptoms.severity.to_string(),
            concerning_patterns: self.symptoms.concerning.clone(),
            symptom_categories: self
                .symptoms
                .categorized
                .iter()
                .filter(|(_, found)| !found.is_empty())
                .map(|(category, found)| (category.to_string(), found.clone()))
                .collect(),
            medical_follow_up: Vec::new(),
            monitoring: Vec::new(),
            ai_analysis: ai,
            strategy: strategy.to_string(),
            fallback_used: false,
            error_message: None,
        }
    }
}

fn risk_assessment_text(level: RiskLevel) -> String {
    format!("Your risk level is {}", level)
}

#[async_trait]
pub trait AnalysisStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    async fn analyze(&self, submission: &Submission<'_>) -> Result<QuestionnaireResponse, StrategyError>;
}

/// Narrative analysis from a chat-completion model.
pub struct LlmStrategy {
    client: ChatClient,
}

impl LlmStrategy {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnalysisStrategy for LlmStrategy {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn is_available(&self) -> bool {
        self.client.has_credentials()
    }

    async fn analyze(&self, submission: &Submission<'_>) -> Result<QuestionnaireResponse, StrategyError> {
        let messages = [
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(prompt::user_prompt(submission.request)),
        ];
        let raw = self.client.complete(&messages).await?;
        log::debug!("LLM response length: {}", raw.len());
        Ok(response_from_completion(&raw, submission, self.client.model()))
    }
}

/// Builds the response from model output, substituting the canned
/// narrative when the output is not the requested JSON.
pub fn response_from_completion(raw: &str, submission: &Submission<'_>, model: &str) -> QuestionnaireResponse {
    match prompt::parse_analysis(raw) {
        Ok(analysis) => from_llm_analysis(analysis, submission, model),
        Err(e) => {
            log::error!("JSON parsing failed: {}", e);
            unparsed_response(raw, submission, model)
        }
    }
}

fn from_llm_analysis(analysis: LlmAnalysis, submission: &Submission<'_>, model: &str) -> QuestionnaireResponse {
    let level = RiskLevel::from_str(analysis.risk_assessment.level.trim()).unwrap_or_else(|_| {
        log::warn!(
            "LLM returned unknown risk level {:?}, using rule level {}",
            analysis.risk_assessment.level,
            submission.rules.level
        );
        submission.rules.level
    });
    let education = rules::patient_education(level, &submission.rules.risk_factors, &submission.symptoms.symptoms);

    let mut recommendations = analysis.recommendations.immediate_actions;
    recommendations.extend(analysis.recommendations.lifestyle_changes);

    let mut insights = submission.insights(
        "llm",
        analysis.risk_assessment.key_factors,
        analysis.symptoms_analysis.primary_symptoms,
        true,
    );
    if !analysis.symptoms_analysis.symptom_severity.trim().is_empty() {
        insights.symptom_severity = analysis.symptoms_analysis.symptom_severity;
    }
    if !analysis.symptoms_analysis.concerning_patterns.is_empty() {
        insights.concerning_patterns = analysis.symptoms_analysis.concerning_patterns;
    }
    insights.medical_follow_up = analysis.recommendations.medical_follow_up;

    QuestionnaireResponse {
        analysis: if analysis.analysis_summary.trim().is_empty() {
            "Analysis completed".to_string()
        } else {
            analysis.analysis_summary
        },
        summary_paragraph: analysis.summary_paragraph.unwrap_or(education.summary_paragraph),
        risk_level: level,
        risk_assessment: risk_assessment_text(level),
        recommendations,
        next_steps: analysis.next_steps,
        confidence_score: analysis.risk_assessment.confidence.unwrap_or(RULE_CONFIDENCE).clamp(0.0, 1.0),
        detailed_insights: insights,
        patient_education: analysis.patient_education.unwrap_or(education.content),
        follow_up_questions: analysis.follow_up_questions,
        metadata: submission.metadata(Some(model.to_string())),
    }
}

fn unparsed_response(raw: &str, submission: &Submission<'_>, model: &str) -> QuestionnaireResponse {
    let summary = if raw.chars().count() > 200 {
        format!("{}...", raw.chars().take(200).collect::<String>())
    } else {
        raw.to_string()
    };
    let level = submission.rules.level;
    let education = rules::patient_education(level, &submission.rules.risk_factors, &submission.symptoms.symptoms);
    let mut metadata = submission.metadata(Some(model.to_string()));
    metadata.parsing_error = true;
    metadata.raw_response = Some(raw.to_string());

    QuestionnaireResponse {
        analysis: summary,
        summary_paragraph: education.summary_paragraph,
        risk_level: level,
        risk_assessment: risk_assessment_text(level),
        recommendations: vec![
            "Consult with a healthcare professional".to_string(),
            "Maintain good oral hygiene".to_string(),
        ],
        next_steps: vec![
            "Review the analysis with a healthcare provider".to_string(),
            "Schedule a dental consultation".to_string(),
        ],
        confidence_score: FALLBACK_CONFIDENCE,
        detailed_insights: submission.insights(
            "llm",
            submission.rules.risk_factors.clone(),
            submission.symptoms.symptoms.clone(),
            true,
        ),
        patient_education: "Please consult with a healthcare professional for a detailed assessment.".to_string(),
        follow_up_questions: vec![
            "Would you like to schedule a follow-up consultation?".to_string(),
            "Do you have any specific concerns about your oral health?".to_string(),
        ],
        metadata,
    }
}

/// Deterministic analysis from the rule tables.
pub struct RuleStrategy;

impl RuleStrategy {
    pub fn respond(submission: &Submission<'_>) -> QuestionnaireResponse {
        let assessment = &submission.rules;
        let symptoms = &submission.symptoms.symptoms;
        let recommendations = rules::build_recommendations(assessment.level, &assessment.risk_factors, symptoms);
        let education = rules::patient_education(assessment.level, &assessment.risk_factors, symptoms);

        let mut insights = submission.insights("rules", assessment.risk_factors.clone(), symptoms.clone(), false);
        insights.medical_follow_up = recommendations.medical_follow_up;
        insights.monitoring = recommendations.monitoring;

        let mut combined = recommendations.immediate_actions;
        combined.extend(recommendations.lifestyle_changes);

        QuestionnaireResponse {
            analysis: format!(
                "Based on your responses, we've identified {} risk factors and {} symptoms.",
                assessment.risk_factors.len(),
                symptoms.len()
            ),
            summary_paragraph: education.summary_paragraph,
            risk_level: assessment.level,
            risk_assessment: risk_assessment_text(assessment.level),
            recommendations: combined,
            next_steps: vec![
                "Review the detailed analysis".to_string(),
                "Follow the provided recommendations".to_string(),
                "Schedule appropriate follow-up care".to_string(),
            ],
            confidence_score: RULE_CONFIDENCE,
            detailed_insights: insights,
            patient_education: education.content,
            follow_up_questions: vec![
                "Do you have any questions about the analysis?".to_string(),
                "Would you like to discuss any specific concerns?".to_string(),
            ],
            metadata: submission.metadata(None),
        }
    }
}

#[async_trait]
impl AnalysisStrategy for RuleStrategy {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn analyze(&self, submission: &Submission<'_>) -> Result<QuestionnaireResponse, StrategyError> {
        Ok(Self::respond(submission))
    }
}

/// Ordered strategy chain; the first success wins.
pub struct QuestionnaireAnalyzer {
    strategies: Vec<Box<dyn AnalysisStrategy>>,
}

impl QuestionnaireAnalyzer {
    pub fn from_config(llm: Option<&LlmConfig>) -> Self {
        let mut strategies: Vec<Box<dyn AnalysisStrategy>> = Vec::new();
        match llm {
            Some(config) => {
                log::info!("LLM analysis enabled ({})", config.model);
                strategies.push(Box::new(LlmStrategy::new(ChatClient::new(config))));
            }
            None => log::warn!("No LLM API key configured, questionnaire analysis uses rules only"),
        }
        strategies.push(Box::new(RuleStrategy));
        Self::with_strategies(strategies)
    }

    pub fn rules_only() -> Self {
        Self::with_strategies(vec![Box::new(RuleStrategy)])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn AnalysisStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn analyze(&self, request: &QuestionnaireRequest) -> Result<QuestionnaireResponse, AnalysisError> {
        validate(&request.answers)?;
        let submission = Submission::new(request);
        log::info!(
            "Analyzing questionnaire {} with {} answers",
            submission.questionnaire_id,
            request.answers.len()
        );

        let mut last_error: Option<String> = None;
        for strategy in &self.strategies {
            if !strategy.is_available() {
                log::debug!("Strategy {} unavailable, skipping", strategy.name());
                continue;
            }
            match strategy.analyze(&submission).await {
                Ok(mut response) => {
                    log::info!("Questionnaire {} analyzed with {}", submission.questionnaire_id, strategy.name());
                    if let Some(error) = last_error {
                        response.detailed_insights.fallback_used = true;
                        response.detailed_insights.error_message = Some(error);
                        response.confidence_score = response.confidence_score.min(FALLBACK_CONFIDENCE);
                        response.analysis.push_str(" (Note: AI analysis temporarily unavailable)");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    log::error!("Strategy {} failed: {}", strategy.name(), e);
                    last_error = Some(e.to_string());
                }
            }
        }
        Err(AnalysisError::Exhausted(
            last_error.unwrap_or_else(|| "no strategy available".to_string()),
        ))
    }

    pub fn quick_analysis(&self, answers: &[QuestionnaireAnswer]) -> Result<QuickAnalysisResponse, ValidationError> {
        validate(answers)?;
        let assessment = rules::assess_risk(answers);
        let symptoms = rules::analyze_symptoms(answers);
        let recommendation = match assessment.level {
            RiskLevel::High => "Please consult an oral medicine specialist as soon as possible.",
            _ => "Consult with a healthcare professional for detailed assessment",
        };
        Ok(QuickAnalysisResponse {
            risk_level: assessment.level,
            risk_factors_count: assessment.risk_factors.len(),
            risk_factors: assessment.risk_factors,
            symptoms_identified: symptoms.symptoms,
            recommendation: recommendation.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl AnalysisStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn analyze(&self, _submission: &Submission<'_>) -> Result<QuestionnaireResponse, StrategyError> {
            Err(StrategyError::Llm(LlmError::EmptyResponse))
        }
    }

    struct Unavailable;

    #[async_trait]
    impl AnalysisStrategy for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn is_available(&self) -> bool {
            false
        }

        async fn analyze(&self, _submission: &Submission<'_>) -> Result<QuestionnaireResponse, StrategyError> {
            panic!("must not be called")
        }
    }

    fn request(pairs: &[(&str, &str)]) -> QuestionnaireRequest {
        QuestionnaireRequest {
            answers: pairs
                .iter()
                .map(|(id, a)| QuestionnaireAnswer {
                    question_id: id.to_string(),
                    answer: a.to_string(),
                    question_text: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn rules_only_analysis() {
        let analyzer = QuestionnaireAnalyzer::rules_only();
        let response = analyzer
            .analyze(&request(&[("q1", "yes"), ("q2", "yes"), ("q3", "yes")]))
            .await
            .unwrap();

        assert_eq!(response.risk_level, RiskLevel::High);
        assert_eq!(response.risk_assessment, "Your risk level is High");
        assert_eq!(response.confidence_score, RULE_CONFIDENCE);
        assert_eq!(response.detailed_insights.strategy, "rules");
        assert_eq!(response.detailed_insights.yes_count, 3);
        assert!(!response.detailed_insights.fallback_used);
        assert!(response.metadata.questionnaire_id.starts_with("q_"));
        assert!(response.recommendations[0].contains("urgent"));
        assert_eq!(response.detailed_insights.symptom_severity, "Mild");
        assert_eq!(response.detailed_insights.medical_follow_up.len(), 4);
        assert_eq!(response.detailed_insights.monitoring.len(), 4);
    }

    #[actix_web::test]
    async fn failed_strategy_falls_through_to_rules() {
        let analyzer = QuestionnaireAnalyzer::with_strategies(vec![
            Box::new(Unavailable),
            Box::new(Failing),
            Box::new(RuleStrategy),
        ]);
        let response = analyzer.analyze(&request(&[("q1", "yes"), ("q2", "yes")])).await.unwrap();

        assert_eq!(response.risk_level, RiskLevel::Medium);
        assert!(response.detailed_insights.fallback_used);
        assert_eq!(
            response.detailed_insights.error_message.as_deref(),
            Some("LLM call failed: LLM API returned no content")
        );
        assert_eq!(response.confidence_score, FALLBACK_CONFIDENCE);
        assert!(response.analysis.ends_with("(Note: AI analysis temporarily unavailable)"));
    }

    #[actix_web::test]
    async fn exhausted_chain_is_an_error() {
        let analyzer = QuestionnaireAnalyzer::with_strategies(vec![Box::new(Failing)]);
        let result = analyzer.analyze(&request(&[("q1", "no")])).await;
        assert!(matches!(result, Err(AnalysisError::Exhausted(_))));
    }

    #[actix_web::test]
    async fn empty_submission_is_rejected() {
        let analyzer = QuestionnaireAnalyzer::rules_only();
        let result = analyzer.analyze(&request(&[])).await;
        assert!(matches!(result, Err(AnalysisError::Invalid(ValidationError::NoAnswers))));

        let result = analyzer.analyze(&request(&[("q1", "yes"), (" ", "no")])).await;
        assert!(matches!(
            result,
            Err(AnalysisError::Invalid(ValidationError::MissingQuestionId(1)))
        ));
    }

    #[test]
    fn llm_json_is_mapped() {
        let req = request(&[("q1", "yes")]);
        let submission = Submission::new(&req);
        let raw = r#"```json
{
  "analysis_summary": "Mostly fine.",
  "risk_assessment": {"level": "medium", "confidence": 0.72, "key_factors": ["sores"]},
  "symptoms_analysis": {"primary_symptoms": ["ulcer"], "symptom_severity": "Moderate"},
  "recommendations": {"immediate_actions": ["See a dentist"], "lifestyle_changes": ["Floss"]},
  "next_steps": ["Book a visit"],
  "patient_education": "Brush twice daily.",
  "follow_up_questions": ["How long has the ulcer been present?"]
}
```"#;
        let response = response_from_completion(raw, &submission, "gpt-4o");

        assert_eq!(response.risk_level, RiskLevel::Medium);
        assert_eq!(response.analysis, "Mostly fine.");
        assert_eq!(response.recommendations, vec!["See a dentist", "Floss"]);
        assert!((response.confidence_score - 0.72).abs() < 1e-6);
        assert_eq!(response.detailed_insights.risk_factors, vec!["sores"]);
        assert_eq!(response.detailed_insights.symptom_severity, "Moderate");
        assert!(response.detailed_insights.ai_analysis);
        assert_eq!(response.metadata.model_used.as_deref(), Some("gpt-4o"));
        assert!(!response.metadata.parsing_error);
        // missing summary falls back to the rule narrative
        assert!(response.summary_paragraph.starts_with("Based on your questionnaire responses"));
    }

    #[test]
    fn unparseable_output_uses_canned_narrative() {
        let req = request(&[("q1", "yes"), ("q2", "yes"), ("q5", "yes")]);
        let submission = Submission::new(&req);
        let raw = "x".repeat(250);
        let response = response_from_completion(&raw, &submission, "gpt-4o");

        assert_eq!(response.risk_level, RiskLevel::High);
        assert_eq!(response.confidence_score, FALLBACK_CONFIDENCE);
        assert!(response.metadata.parsing_error);
        assert_eq!(response.metadata.raw_response.as_deref(), Some(raw.as_str()));
        assert_eq!(response.analysis.len(), 203);
        assert_eq!(response.follow_up_questions.len(), 2);
    }

    #[test]
    fn unknown_llm_level_uses_rules() {
        let req = request(&[("q1", "yes"), ("q2", "yes")]);
        let submission = Submission::new(&req);
        let response =
            response_from_completion(r#"{"risk_assessment": {"level": "Moderate"}}"#, &submission, "m");
        assert_eq!(response.risk_level, RiskLevel::Medium);
        assert_eq!(response.confidence_score, RULE_CONFIDENCE);
    }

    #[test]
    fn quick_analysis_counts_factors() {
        let analyzer = QuestionnaireAnalyzer::rules_only();
        let req = request(&[("q1", "yes"), ("q2", "no"), ("q10", "bleeding gums")]);
        let quick = analyzer.quick_analysis(&req.answers).unwrap();
        assert_eq!(quick.risk_level, RiskLevel::Low);
        assert_eq!(quick.risk_factors_count, 1);
        assert_eq!(quick.symptoms_identified, vec!["bleeding gums"]);
        assert_eq!(analyzer.quick_analysis(&[]).unwrap_err(), ValidationError::NoAnswers);
    }

    #[test]
    fn ids_are_stable_and_order_sensitive() {
        let a = request(&[("q1", "yes"), ("q2", "no")]);
        let b = request(&[("q2", "no"), ("q1", "yes")]);
        assert_eq!(questionnaire_id(&a.answers), questionnaire_id(&a.answers));
        assert_ne!(questionnaire_id(&a.answers), questionnaire_id(&b.answers));
        assert_eq!(questionnaire_id(&a.answers).len(), 18);
    }

    #[test]
    fn separators_inside_answers_do_not_collide() {
        let joined = request(&[("q1", "a;q2=b")]);
        let split = request(&[("q1", "a"), ("q2", "b")]);
        assert_ne!(questionnaire_id(&joined.answers), questionnaire_id(&split.answers));

        let shifted = request(&[("q1=x", "y")]);
        let plain = request(&[("q1", "x=y")]);
        assert_ne!(questionnaire_id(&shifted.answers), questionnaire_id(&plain.answers));
    }

    #[test]
    fn llm_strategy_comes_first_when_configured() {
        let config = LlmConfig {
            api_key: "k".into(),
            base_url: "http://localhost".into(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            max_tokens: 1000,
        };
        assert_eq!(
            QuestionnaireAnalyzer::from_config(Some(&config)).strategy_names(),
            vec!["llm", "rules"]
        );
        assert_eq!(QuestionnaireAnalyzer::from_config(None).strategy_names(), vec!["rules"]);
    }
}
