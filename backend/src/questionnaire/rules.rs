//! Deterministic scoring over the five fixed symptom questions. Always
//! available; the last strategy in the analysis chain.

use shared::{Question, QuestionnaireAnswer, RiskLevel};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, IntoEnumIterator};

/// `(id, question, risk factor label)`
pub const QUESTIONS: [(&str, &str, &str); 5] = [
    (
        "q1",
        "Do you have any sores or ulcers in your mouth?",
        "Sores or ulcers in mouth",
    ),
    (
        "q2",
        "Is there any swelling or redness in your mouth?",
        "Swelling or redness in mouth",
    ),
    (
        "q3",
        "Are you experiencing any unusual pain in your mouth?",
        "Unusual pain in mouth",
    ),
    (
        "q4",
        "Have you noticed any changes in the inner lining of your mouth recently?",
        "Changes in inner lining of mouth",
    ),
    (
        "q5",
        "Have you noticed any lumps or thickened areas in your mouth or neck?",
        "Lumps or thickened areas in mouth or neck",
    ),
];

const ADDITIONAL_SYMPTOMS_ID: &str = "q10";
const SEVERITY_WORDS: [&str; 4] = ["severe", "intense", "unbearable", "constant"];
const CONCERNING_WORDS: [&str; 4] = ["lump", "swelling", "bleeding", "numbness"];

pub fn questions() -> Vec<Question> {
    QUESTIONS
        .iter()
        .map(|(id, text, _)| Question {
            id: id.to_string(),
            text: text.to_string(),
        })
        .collect()
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "yes" | "true")
}

fn is_yes_no(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "yes" | "no" | "true" | "false"
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleAssessment {
    pub level: RiskLevel,
    pub yes_count: usize,
    pub risk_factors: Vec<String>,
}

/// `>= 3` yes answers is High, exactly 2 is Medium, otherwise Low.
/// Unknown question ids are ignored.
pub fn assess_risk(answers: &[QuestionnaireAnswer]) -> RuleAssessment {
    let mut risk_factors = Vec::new();
    for answer in answers {
        let Some((_, _, label)) = QUESTIONS.iter().find(|(id, _, _)| *id == answer.question_id) else {
            continue;
        };
        if is_affirmative(&answer.answer) {
            risk_factors.push(label.to_string());
        }
    }

    let yes_count = risk_factors.len();
    let level = match yes_count {
        n if n >= 3 => RiskLevel::High,
        2 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    };
    RuleAssessment {
        level,
        yes_count,
        risk_factors,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum SymptomCategory {
    Visual,
    Pain,
    Functional,
    Systemic,
}

impl SymptomCategory {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            SymptomCategory::Visual => &["white patches", "red patches", "lumps", "swelling"],
            SymptomCategory::Pain => &["pain", "discomfort", "burning sensation"],
            SymptomCategory::Functional => &["difficulty swallowing", "speech problems", "numbness"],
            SymptomCategory::Systemic => &["weight loss", "fatigue", "fever"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymptomAnalysis {
    pub symptoms: Vec<String>,
    pub categorized: BTreeMap<SymptomCategory, Vec<String>>,
    pub severity: Severity,
    pub concerning: Vec<String>,
}

/// Collects free-text answers as symptoms. Plain yes/no answers carry no
/// description and are skipped.
pub fn analyze_symptoms(answers: &[QuestionnaireAnswer]) -> SymptomAnalysis {
    let mut symptoms = Vec::new();
    for answer in answers {
        let text = answer.answer.trim().to_lowercase();
        if text.is_empty() {
            continue;
        }
        if answer.question_id == ADDITIONAL_SYMPTOMS_ID {
            if text != "none" {
                symptoms.push(text);
            }
        } else if !is_yes_no(&text) {
            symptoms.push(text);
        }
    }

    let mut categorized = BTreeMap::new();
    for category in SymptomCategory::iter() {
        let matches: Vec<String> = symptoms
            .iter()
            .filter(|s| category.keywords().iter().any(|k| s.contains(k)))
            .cloned()
            .collect();
        categorized.insert(category, matches);
    }

    let joined = symptoms.join(" ");
    let severity = if SEVERITY_WORDS.iter().any(|w| joined.contains(w)) {
        Severity::Severe
    } else if symptoms.len() > 3 {
        Severity::Moderate
    } else {
        Severity::Mild
    };

    let concerning = symptoms
        .iter()
        .filter(|s| CONCERNING_WORDS.iter().any(|w| s.contains(w)))
        .cloned()
        .collect();

    SymptomAnalysis {
        symptoms,
        categorized,
        severity,
        concerning,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationSet {
    pub immediate_actions: Vec<String>,
    pub lifestyle_changes: Vec<String>,
    pub medical_follow_up: Vec<String>,
    pub monitoring: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn build_recommendations(level: RiskLevel, risk_factors: &[String], symptoms: &[String]) -> RecommendationSet {
    let immediate_actions = match level {
        RiskLevel::High => owned(&[
            "Schedule an urgent appointment with an oral medicine specialist",
            "Consider consulting an oncologist for further evaluation",
            "Document all symptoms with photos if possible",
        ]),
        RiskLevel::Medium => owned(&[
            "Schedule a dental appointment within 1-2 weeks",
            "Monitor symptoms daily and note any changes",
        ]),
        RiskLevel::Low => owned(&[
            "Schedule a routine dental check-up",
            "Continue monitoring oral health",
        ]),
    };

    let lifestyle_changes = owned(&[
        "Maintain excellent oral hygiene (brush twice daily, floss daily)",
        "Use alcohol-free mouthwash",
        "Eat a balanced diet rich in fruits and vegetables",
        "Avoid excessive sun exposure to lips",
    ]);

    let mut medical_follow_up = Vec::new();
    let mentions = |word: &str| {
        symptoms
            .iter()
            .chain(risk_factors.iter())
            .any(|s| s.to_lowercase().contains(word))
    };
    if mentions("lump") || mentions("swelling") {
        medical_follow_up.push("Consider biopsy for any lumps or swellings".to_string());
    }
    if symptoms.iter().any(|s| s.contains("difficulty swallowing")) {
        medical_follow_up.push("Consult with an ENT specialist".to_string());
    }
    medical_follow_up.extend(owned(&[
        "Regular dental cleanings every 6 months",
        "Annual oral cancer screening",
        "Follow up on any concerning symptoms",
    ]));

    RecommendationSet {
        immediate_actions,
        lifestyle_changes,
        medical_follow_up,
        monitoring: owned(&[
            "Check mouth weekly for any changes",
            "Note any new symptoms or changes in existing ones",
            "Keep a symptom diary",
            "Take photos of any visible changes",
        ]),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Education {
    pub summary_paragraph: String,
    pub content: String,
}

pub fn patient_education(level: RiskLevel, risk_factors: &[String], symptoms: &[String]) -> Education {
    let mut parts: Vec<String> = vec![
        "Your oral health is a vital component of your overall well-being. The mouth serves as the gateway to your body, and maintaining good oral hygiene can significantly impact your general health, preventing various systemic conditions and improving your quality of life.".to_string(),
    ];

    parts.push(
        match level {
            RiskLevel::High => "Based on your responses, we've identified several risk factors that require attention. High-risk individuals should prioritize regular dental check-ups every 3-6 months and maintain excellent oral hygiene practices. Early intervention and consistent monitoring are crucial for managing these risk factors effectively.",
            RiskLevel::Medium => "Your responses indicate some risk factors that warrant attention. Medium-risk individuals should maintain regular dental visits every 6 months and be vigilant about oral hygiene. Proactive care can help prevent the progression of potential issues.",
            RiskLevel::Low => "Your responses suggest a generally low-risk profile, which is excellent. However, maintaining preventive care through regular dental visits and good oral hygiene practices remains important for long-term oral health.",
        }
        .to_string(),
    );

    if !risk_factors.is_empty() {
        parts.push(format!(
            "Regarding your identified risk factors ({}), it's important to understand how these factors can impact your oral health. Each risk factor can contribute to various oral health conditions, and addressing them through lifestyle changes and professional care can significantly improve your oral health outcomes.",
            risk_factors.join(", ")
        ));
    }

    if !symptoms.is_empty() {
        parts.push(format!(
            "Concerning your reported symptoms ({}), it's important to understand that these could indicate various conditions ranging from minor irritations to more serious concerns. Professional evaluation is essential for accurate diagnosis and appropriate treatment.",
            symptoms.join(", ")
        ));
    }

    parts.push("General oral health maintenance includes brushing your teeth twice daily with fluoride toothpaste, flossing daily, using mouthwash as recommended, and avoiding tobacco products and excessive alcohol consumption. A balanced diet rich in fruits and vegetables while limiting sugary foods and drinks also supports oral health.".to_string());
    parts.push("Prevention is always better than treatment. Regular self-examinations of your mouth, being aware of any changes in appearance or sensation, and seeking prompt professional care when concerns arise are key to maintaining optimal oral health. Early detection of oral health issues significantly improves treatment outcomes and reduces the complexity of care needed.".to_string());
    parts.push("While self-care is important, professional dental care provides specialized expertise in detecting issues that may not be visible or noticeable to you. Your dentist can identify early signs of problems, provide professional cleanings that remove plaque and tartar buildup, and offer personalized advice based on your specific oral health needs and risk factors.".to_string());

    let mut summary = vec![format!(
        "Based on your questionnaire responses, your oral health risk level is {}.",
        level.to_string().to_lowercase()
    )];
    if !risk_factors.is_empty() {
        summary.push(format!("Key risk factors identified include: {}.", risk_factors.join(", ")));
    }
    if !symptoms.is_empty() {
        summary.push(format!("You reported symptoms such as: {}.", symptoms.join(", ")));
    }
    summary.push("Maintaining good oral hygiene, regular dental check-ups, and addressing any risk factors are essential for optimal oral health.".to_string());

    Education {
        summary_paragraph: summary.join(" "),
        content: parts.join(" "),
    }
}
