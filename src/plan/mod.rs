use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{ModuleId, SessionModule};

/// Generation parameter overrides passed through to the question module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
}

/// Source-material overrides for modules that build questions from a text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_per_gap: Option<u32>,
}

/// Scoring overrides for one plan entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// One Teil of a session plan. Immutable once generation starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub id: String,
    pub label: String,
    pub module_id: ModuleId,
    pub requested_count: u32,
    pub generate_example: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_overrides: Option<PromptOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_overrides: Option<SourceOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_overrides: Option<ScoringOverrides>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl PlanEntry {
    pub fn new(id: &str, label: &str, module_id: ModuleId, requested_count: u32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            module_id,
            requested_count,
            generate_example: false,
            total_points: None,
            prompt_overrides: None,
            source_overrides: None,
            scoring_overrides: None,
            metadata: Value::Null,
        }
    }

    pub fn with_example(mut self) -> Self {
        self.generate_example = true;
        self
    }

    pub fn with_total_points(mut self, points: u32) -> Self {
        self.total_points = Some(points);
        self
    }

    pub fn with_source_overrides(mut self, overrides: SourceOverrides) -> Self {
        self.source_overrides = Some(overrides);
        self
    }
}

/// Ordered plan for one session module. Teil numbers are 1-based positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlan {
    pub module: SessionModule,
    pub entries: Vec<PlanEntry>,
}

impl SessionPlan {
    pub fn new(module: SessionModule, entries: Vec<PlanEntry>) -> Self {
        Self { module, entries }
    }

    /// The fixed exam layout for a module
    pub fn builtin(module: SessionModule) -> Self {
        let entries = match module {
            SessionModule::Reading => vec![
                PlanEntry::new("teil_1", "Teil 1", ModuleId::MultipleChoice, 8)
                    .with_example()
                    .with_total_points(8)
                    .with_source_overrides(SourceOverrides {
                        source_type: Some("gap_text".to_string()),
                        gap_count: Some(8),
                        options_per_gap: Some(3),
                    }),
                PlanEntry::new("teil_2", "Teil 2", ModuleId::MultipleChoice, 6)
                    .with_total_points(6),
                PlanEntry::new("teil_3", "Teil 3", ModuleId::StatementMatch, 1),
            ],
            SessionModule::Listening => vec![
                PlanEntry::new("teil_1", "Teil 1", ModuleId::MultipleChoice, 8)
                    .with_total_points(8),
                PlanEntry::new("teil_2", "Teil 2", ModuleId::StatementMatch, 1),
            ],
            SessionModule::Writing => vec![PlanEntry::new(
                "teil_1",
                "Teil 1",
                ModuleId::WrittenResponse,
                1,
            )
            .with_total_points(25)],
            SessionModule::Speaking => vec![PlanEntry::new(
                "teil_1",
                "Teil 1",
                ModuleId::SpokenResponse,
                1,
            )],
        };

        Self { module, entries }
    }

    pub fn teil_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Estimated scoring units, used as the generation progress denominator
    pub fn total_requested_units(&self) -> u32 {
        self.entries.iter().map(|e| e.requested_count).sum()
    }
}
