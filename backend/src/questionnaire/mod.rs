pub mod analyzer;
pub mod prompt;
pub mod rules;

pub use analyzer::{AnalysisError, QuestionnaireAnalyzer, ValidationError};
