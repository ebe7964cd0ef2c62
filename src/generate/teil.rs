use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppResult;
use crate::gateway::{GenerationTask, QuestionGateway, RawQuestion, UsageRecord};
use crate::model::{Difficulty, ModuleId, Question, SessionModule};
use crate::plan::PlanEntry;

/// One completed Teil, ready for the reorder buffer
#[derive(Debug, Clone)]
pub struct GeneratedTeil {
    pub teil: u32,
    pub questions: Vec<Question>,
    pub usage: Vec<UsageRecord>,
}

/// Turns one plan entry into a finished, numbered, points-redistributed list
/// of questions via a single gateway call.
#[derive(Clone)]
pub struct TeilGenerator {
    gateway: Arc<dyn QuestionGateway>,
}

impl TeilGenerator {
    pub fn new(gateway: Arc<dyn QuestionGateway>) -> Self {
        Self { gateway }
    }

    pub async fn generate(
        &self,
        entry: &PlanEntry,
        teil: u32,
        session_module: SessionModule,
        difficulty: Difficulty,
    ) -> AppResult<GeneratedTeil> {
        let question_count = if entry.generate_example {
            entry.requested_count + 1
        } else {
            entry.requested_count
        };

        let task = GenerationTask {
            module_id: entry.module_id,
            session_module,
            difficulty,
            question_count,
            prompt_overrides: entry.prompt_overrides.clone(),
            source_overrides: entry.source_overrides.clone(),
            scoring_overrides: entry.scoring_overrides.clone(),
        };

        debug!(teil, module = %entry.module_id, count = question_count, "Generating Teil");

        let batch = self.gateway.generate(&task).await?;

        let mut questions: Vec<Question> = batch
            .questions
            .into_iter()
            .enumerate()
            .map(|(order, raw)| stamp_question(raw, entry.module_id, session_module, teil, order))
            .collect();

        if entry.generate_example {
            if let Some(first) = questions.first_mut() {
                convert_to_example(first);
            }
        }

        if let Some(total_points) = entry.total_points {
            redistribute_points(&mut questions, total_points);
        }

        info!(
            teil,
            module = %entry.module_id,
            questions = questions.len(),
            "Teil generated"
        );

        Ok(GeneratedTeil {
            teil,
            questions,
            usage: batch.usage,
        })
    }
}

fn stamp_question(
    raw: RawQuestion,
    module_id: ModuleId,
    session_module: SessionModule,
    teil: u32,
    order: usize,
) -> Question {
    let points = raw.points.unwrap_or_else(|| match module_id {
        ModuleId::StatementMatch => (raw.statements.len() as u32).max(1),
        _ => 1,
    });

    Question {
        id: raw.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        module_id,
        session_module,
        teil,
        order: order as u32,
        prompt: raw.prompt,
        content: raw.content,
        points,
        is_example: false,
        answer: None,
        answered: false,
        last_submitted_at: None,
        input_type: module_id.input_type(),
        options: raw.options,
        correct_option_id: raw.correct_option_id,
        correct_answer: raw.correct_answer,
        statements: raw.statements,
        correct_matches: raw.correct_matches,
        gaps: raw.gaps,
        scoring_rubric: raw.scoring_rubric,
    }
}

/// Turn the first generated item into a worked example with a prefilled
/// answer. First non-empty source wins, in fixed priority order.
fn convert_to_example(question: &mut Question) {
    fn non_empty(value: Value) -> Option<Value> {
        match &value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            _ => Some(value),
        }
    }

    let answer = question
        .correct_option_id
        .clone()
        .filter(|id| !id.is_empty())
        .map(Value::String)
        .or_else(|| question.correct_answer.clone().and_then(non_empty))
        .or_else(|| {
            question
                .gaps
                .iter()
                .find(|gap| !gap.solution.is_empty())
                .map(|gap| Value::String(gap.solution.clone()))
        })
        .or_else(|| question.correct_matches.clone().and_then(non_empty));

    question.is_example = true;
    question.points = 0;
    question.answered = true;
    question.answer = answer;
}

/// Spread a total-points override evenly over the scorable items. The first
/// `total mod count` items take the extra point; rubrics are rescaled to the
/// item's new total with the rounding error absorbed into the first criterion.
fn redistribute_points(questions: &mut [Question], total_points: u32) {
    let count = questions.iter().filter(|q| !q.is_example).count() as u32;
    if count == 0 {
        return;
    }

    let base = total_points / count;
    let remainder = total_points % count;

    let mut index = 0u32;
    for question in questions.iter_mut().filter(|q| !q.is_example) {
        let points = if index < remainder { base + 1 } else { base };
        question.points = points;
        rescale_rubric(question, points);
        index += 1;
    }
}

fn rescale_rubric(question: &mut Question, new_total: u32) {
    let old_total: u32 = question.scoring_rubric.iter().map(|c| c.max_points).sum();
    if old_total == 0 || question.scoring_rubric.is_empty() {
        return;
    }

    for criterion in question.scoring_rubric.iter_mut() {
        let scaled =
            (criterion.max_points as f64 * new_total as f64 / old_total as f64).round() as u32;
        criterion.max_points = scaled;
    }

    let rescaled_total: u32 = question.scoring_rubric.iter().map(|c| c.max_points).sum();
    let drift = new_total as i64 - rescaled_total as i64;
    if drift != 0 {
        let first = &mut question.scoring_rubric[0];
        first.max_points = (first.max_points as i64 + drift).max(0) as u32;
    }
}
