#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use lernsession::error::{GatewayError, GatewayResult};
use lernsession::gateway::{GeneratedBatch, GenerationTask, QuestionGateway, RawQuestion};
use lernsession::model::{ModuleId, SessionModule, Statement};
use lernsession::plan::{PlanEntry, PromptOverrides, SessionPlan};
use lernsession::storage::SqliteSessionStore;

/// Scripted behavior for one Teil, keyed by the entry's user prompt
#[derive(Debug, Clone, Default)]
pub struct TeilScript {
    pub delay_ms: u64,
    pub fail: bool,
}

/// Deterministic gateway for tests. Entries without a script succeed
/// immediately; scripted entries sleep first and can be told to fail, which
/// lets tests force any Teil completion order.
pub struct ScriptedGateway {
    scripts: HashMap<String, TeilScript>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
        }
    }

    pub fn with_script(mut self, key: &str, script: TeilScript) -> Self {
        self.scripts.insert(key.to_string(), script);
        self
    }

    fn raw_questions(task: &GenerationTask) -> Vec<RawQuestion> {
        (0..task.question_count)
            .map(|i| {
                let mut raw = RawQuestion {
                    id: None,
                    prompt: format!("Frage {}", i + 1),
                    content: Value::Null,
                    points: None,
                    options: Vec::new(),
                    correct_option_id: None,
                    correct_answer: None,
                    statements: Vec::new(),
                    correct_matches: None,
                    gaps: Vec::new(),
                    scoring_rubric: Vec::new(),
                };
                match task.module_id {
                    ModuleId::MultipleChoice => {
                        raw.correct_option_id = Some("a".to_string());
                    }
                    ModuleId::StatementMatch => {
                        raw.statements = (1..=5)
                            .map(|s| Statement {
                                id: format!("s{}", s),
                                text: format!("Aussage {}", s),
                            })
                            .collect();
                        raw.correct_matches = Some(json!({
                            "s1": "a", "s2": "b", "s3": "c", "s4": "d", "s5": "e"
                        }));
                    }
                    ModuleId::WrittenResponse | ModuleId::SpokenResponse => {
                        raw.points = Some(25);
                    }
                }
                raw
            })
            .collect()
    }
}

#[async_trait]
impl QuestionGateway for ScriptedGateway {
    async fn generate(&self, task: &GenerationTask) -> GatewayResult<GeneratedBatch> {
        let key = task
            .prompt_overrides
            .as_ref()
            .and_then(|p| p.user_prompt.clone())
            .unwrap_or_default();

        if let Some(script) = self.scripts.get(&key) {
            if script.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(script.delay_ms)).await;
            }
            if script.fail {
                return Err(GatewayError::Api {
                    status: 502,
                    message: format!("scripted failure for {}", key),
                });
            }
        }

        Ok(GeneratedBatch {
            questions: Self::raw_questions(task),
            usage: Vec::new(),
        })
    }
}

/// Build a multiple-choice plan whose entries carry "1", "2", ... as their
/// user prompt so scripts can address individual Teils.
pub fn keyed_plan(module: SessionModule, teil_count: u32) -> SessionPlan {
    let entries = (1..=teil_count)
        .map(|teil| {
            let mut entry = PlanEntry::new(
                &format!("teil_{}", teil),
                &format!("Teil {}", teil),
                ModuleId::MultipleChoice,
                2,
            );
            entry.prompt_overrides = Some(PromptOverrides {
                user_prompt: Some(teil.to_string()),
                ..Default::default()
            });
            entry
        })
        .collect();
    SessionPlan::new(module, entries)
}

pub async fn memory_store() -> Arc<SqliteSessionStore> {
    Arc::new(
        SqliteSessionStore::in_memory()
            .await
            .expect("in-memory store"),
    )
}
