use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    Difficulty, GapItem, ModuleId, QuestionOption, RubricCriterion, SessionModule, Statement,
};
use crate::plan::{PromptOverrides, ScoringOverrides, SourceOverrides};

/// One generation request sent to a question module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    pub module_id: ModuleId,
    pub session_module: SessionModule,
    pub difficulty: Difficulty,
    pub question_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_overrides: Option<PromptOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_overrides: Option<SourceOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_overrides: Option<ScoringOverrides>,
}

/// An unstamped question as returned by a question module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_matches: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<GapItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scoring_rubric: Vec<RubricCriterion>,
}

/// Token usage reported by the module for one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The full result of one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBatch {
    pub questions: Vec<RawQuestion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usage: Vec<UsageRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_question_minimal_deserialization() {
        let json = r#"{"prompt": "Fill the gap"}"#;
        let raw: RawQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(raw.prompt, "Fill the gap");
        assert!(raw.id.is_none());
        assert!(raw.options.is_empty());
        assert!(raw.content.is_null());
    }

    #[test]
    fn test_generation_task_serialization_omits_empty_overrides() {
        let task = GenerationTask {
            module_id: ModuleId::MultipleChoice,
            session_module: SessionModule::Reading,
            difficulty: Difficulty::Intermediate,
            question_count: 8,
            prompt_overrides: None,
            source_overrides: None,
            scoring_overrides: None,
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"moduleId\":\"multiple_choice\""));
        assert!(!json.contains("promptOverrides"));
    }
}
