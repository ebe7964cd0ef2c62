use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::GradingResult;
use crate::model::{MarkedBy, ModuleId, Question, QuestionResult, UserAnswer};

/// Module-specific marking strategy. May be slow (an AI call behind the
/// written-response marker), hence async.
#[async_trait]
pub trait Marker: Send + Sync {
    async fn mark(&self, question: &Question, answer: &UserAnswer)
        -> GradingResult<QuestionResult>;
}

/// Select the marking strategy for a question module
pub fn marker_for(module_id: ModuleId) -> &'static dyn Marker {
    match module_id {
        ModuleId::MultipleChoice => &MultipleChoiceMarker,
        ModuleId::StatementMatch => &StatementMatchMarker,
        ModuleId::WrittenResponse => &WrittenResponseMarker,
        ModuleId::SpokenResponse => &ManualMarker,
    }
}

fn answer_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn base_result(
    question: &Question,
    answer: &UserAnswer,
    score: f64,
    max_score: f64,
    is_correct: bool,
    feedback: String,
    marked_by: MarkedBy,
) -> QuestionResult {
    QuestionResult {
        question_id: question.id.clone(),
        question: question.clone(),
        user_answer: answer.clone(),
        score,
        max_score,
        is_correct,
        feedback,
        marked_by,
        breakdown: None,
    }
}

/// Marks option-selection questions by comparing the submitted option id
/// against the stored solution. Each hint used costs 10% of the maximum.
pub struct MultipleChoiceMarker;

impl MultipleChoiceMarker {
    fn correct_id(question: &Question) -> Option<String> {
        question
            .correct_option_id
            .clone()
            .or_else(|| {
                question
                    .options
                    .iter()
                    .find(|o| o.is_correct == Some(true))
                    .map(|o| o.id.clone())
            })
            .or_else(|| question.correct_answer.as_ref().map(answer_text))
    }
}

#[async_trait]
impl Marker for MultipleChoiceMarker {
    async fn mark(
        &self,
        question: &Question,
        answer: &UserAnswer,
    ) -> GradingResult<QuestionResult> {
        let max_score = question.points as f64;
        let submitted = answer_text(&answer.answer);
        let correct_id = Self::correct_id(question);

        let is_correct = correct_id
            .as_deref()
            .map(|c| !submitted.is_empty() && submitted == c)
            .unwrap_or(false);

        let score = if is_correct {
            let penalty = 0.1 * max_score * answer.hints_used as f64;
            (max_score - penalty).clamp(0.0, max_score)
        } else {
            0.0
        };

        let feedback = if is_correct {
            "Richtig!".to_string()
        } else {
            match correct_id {
                Some(c) => format!("Leider falsch. Die richtige Antwort ist {}.", c),
                None => "Leider falsch.".to_string(),
            }
        };

        Ok(base_result(
            question,
            answer,
            score,
            max_score,
            is_correct,
            feedback,
            MarkedBy::Automatic,
        ))
    }
}

/// Marks statement-match groups statement by statement. The score equals the
/// number of correctly matched statements, which the summary builder reads
/// back as correct units.
pub struct StatementMatchMarker;

#[async_trait]
impl Marker for StatementMatchMarker {
    async fn mark(
        &self,
        question: &Question,
        answer: &UserAnswer,
    ) -> GradingResult<QuestionResult> {
        let total = question.statements.len() as u32;
        let empty = serde_json::Map::new();
        let correct_matches = question
            .correct_matches
            .as_ref()
            .and_then(Value::as_object);
        let submitted = answer.answer.as_object().unwrap_or(&empty);

        let mut correct_count = 0u32;
        let mut breakdown = serde_json::Map::new();
        for statement in &question.statements {
            let expected = correct_matches
                .and_then(|m| m.get(&statement.id))
                .map(answer_text);
            let given = submitted.get(&statement.id).map(answer_text);
            let statement_correct =
                matches!((&expected, &given), (Some(e), Some(g)) if !e.is_empty() && e == g);
            if statement_correct {
                correct_count += 1;
            }
            breakdown.insert(statement.id.clone(), Value::Bool(statement_correct));
        }

        let is_correct = total > 0 && correct_count == total;
        let feedback = if is_correct {
            "Alle Aussagen wurden korrekt zugeordnet.".to_string()
        } else {
            format!(
                "Du hast {} von {} Aussagen korrekt zugeordnet.",
                correct_count, total
            )
        };

        let mut result = base_result(
            question,
            answer,
            correct_count as f64,
            total as f64,
            is_correct,
            feedback,
            MarkedBy::Automatic,
        );
        result.breakdown = Some(Value::Object(breakdown));
        Ok(result)
    }
}

/// Heuristic AI marking for free-written responses: length-banded base score
/// with a per-criterion breakdown when a rubric is present.
pub struct WrittenResponseMarker;

#[async_trait]
impl Marker for WrittenResponseMarker {
    async fn mark(
        &self,
        question: &Question,
        answer: &UserAnswer,
    ) -> GradingResult<QuestionResult> {
        let max_score = question.points as f64;
        let text = answer_text(&answer.answer);
        let word_count = text.split_whitespace().count();

        let (fraction, feedback) = if word_count == 0 {
            (0.0, "Keine Antwort abgegeben.".to_string())
        } else if word_count < 50 {
            (
                0.3,
                format!(
                    "Die Antwort ist mit {} Wörtern zu kurz für eine vollständige Bearbeitung.",
                    word_count
                ),
            )
        } else if word_count < 100 {
            (
                0.6,
                "Solide Bearbeitung, aber einige Aspekte der Aufgabe fehlen noch.".to_string(),
            )
        } else {
            (
                0.85,
                "Ausführliche Bearbeitung, die die Aufgabenstellung weitgehend erfüllt."
                    .to_string(),
            )
        };

        let score = (max_score * fraction).round();
        let is_correct = max_score > 0.0 && score >= 0.7 * max_score;

        let breakdown = if question.scoring_rubric.is_empty() {
            None
        } else {
            let criteria: Vec<Value> = question
                .scoring_rubric
                .iter()
                .map(|c| {
                    json!({
                        "name": c.name,
                        "score": (c.max_points as f64 * fraction).round(),
                        "maxPoints": c.max_points,
                    })
                })
                .collect();
            Some(json!({ "wordCount": word_count, "criteria": criteria }))
        };

        let mut result = base_result(
            question,
            answer,
            score,
            max_score,
            is_correct,
            feedback,
            MarkedBy::Ai,
        );
        result.breakdown = breakdown;
        Ok(result)
    }
}

/// Placeholder result for modules a human must grade. The summary builder
/// treats manual results as neither correct nor incorrect.
pub struct ManualMarker;

#[async_trait]
impl Marker for ManualMarker {
    async fn mark(
        &self,
        question: &Question,
        answer: &UserAnswer,
    ) -> GradingResult<QuestionResult> {
        Ok(base_result(
            question,
            answer,
            0.0,
            question.points as f64,
            false,
            "Diese Antwort wird manuell bewertet.".to_string(),
            MarkedBy::Manual,
        ))
    }
}
