use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::model::{
    MarkedBy, ModuleBreakdown, ModuleId, Question, QuestionResult, SessionModule, SessionSummary,
    TeilBreakdown,
};
use crate::scoring::units::units_of;

/// Target maximum every module is rescaled to in the module breakdown
pub const MODULE_TARGET_POINTS: u32 = 25;

fn round_half_up(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// A synthesised blank submission does not count as answered
fn has_answer(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn percentage_of(score: f64, max: f64) -> u32 {
    if max > 0.0 {
        round_half_up(100.0 * score / max)
    } else {
        0
    }
}

#[derive(Default)]
struct TeilAccumulator {
    units: u32,
    correct_units: u32,
    score: f64,
    max_score: f64,
}

/// Build a grading summary from a session's questions and results.
///
/// Unanswered scorable questions still count toward unit totals and the
/// maximum score; example questions are ignored entirely.
pub fn build_summary(questions: &[Question], results: &[QuestionResult]) -> SessionSummary {
    let results_by_id: HashMap<&str, &QuestionResult> = results
        .iter()
        .map(|r| (r.question_id.as_str(), r))
        .collect();

    let mut total_units = 0u32;
    let mut answered_units = 0u32;
    let mut correct_units = 0u32;
    let mut incorrect_units = 0u32;
    let mut total_score = 0.0;
    let mut max_score = 0.0;
    let mut pending_manual_review = 0u32;
    let mut ai_marked_count = 0u32;
    let mut automatic_marked_count = 0u32;

    let mut teils: BTreeMap<u32, TeilAccumulator> = BTreeMap::new();
    let mut modules: HashMap<SessionModule, (f64, f64)> = HashMap::new();

    let mut scorable_count = 0u32;
    let mut answered_count = 0u32;
    let mut correct_count = 0u32;
    let mut incorrect_count = 0u32;

    for question in questions.iter().filter(|q| q.is_scorable()) {
        scorable_count += 1;
        let units = units_of(question);
        let result = results_by_id.get(question.id.as_str()).copied();

        let question_max = result
            .map(|r| r.max_score)
            .unwrap_or(question.points as f64);
        let question_score = result.map(|r| r.score).unwrap_or(0.0);

        total_units += units;
        total_score += question_score;
        max_score += question_max;

        let teil = teils.entry(question.teil).or_default();
        teil.units += units;
        teil.score += question_score;
        teil.max_score += question_max;

        let module = modules.entry(question.session_module).or_insert((0.0, 0.0));
        module.0 += question_score;
        module.1 += question_max;

        let Some(result) = result else {
            continue;
        };

        if has_answer(&result.user_answer.answer) {
            answered_units += units;
            answered_count += 1;
        }

        match result.marked_by {
            MarkedBy::Manual => pending_manual_review += 1,
            MarkedBy::Ai => ai_marked_count += 1,
            MarkedBy::Automatic => automatic_marked_count += 1,
        }

        match question.module_id {
            ModuleId::StatementMatch => {
                let correct = (result.score.round().max(0.0) as u32).min(units);
                correct_units += correct;
                incorrect_units += units - correct;
                teil.correct_units += correct;
                if correct == units {
                    correct_count += 1;
                } else {
                    incorrect_count += 1;
                }
            }
            _ => {
                if result.is_correct {
                    correct_units += units;
                    teil.correct_units += units;
                    correct_count += 1;
                } else if result.marked_by != MarkedBy::Manual {
                    incorrect_units += units;
                    incorrect_count += 1;
                }
            }
        }
    }

    // No unit weight anywhere, count whole questions instead
    if total_units == 0 {
        total_units = scorable_count;
        answered_units = answered_count;
        correct_units = correct_count;
        incorrect_units = incorrect_count;
    }

    let teil_breakdown = teils
        .into_iter()
        .map(|(teil, acc)| TeilBreakdown {
            teil,
            units: acc.units,
            correct_units: acc.correct_units,
            score: acc.score,
            max_score: acc.max_score,
            percentage: percentage_of(acc.score, acc.max_score),
        })
        .collect();

    let module_breakdown = SessionModule::ALL
        .iter()
        .map(|&module| {
            let (raw_score, raw_max) = modules.get(&module).copied().unwrap_or((0.0, 0.0));
            let scaled_score = if raw_max > 0.0 {
                round_half_up(raw_score / raw_max * MODULE_TARGET_POINTS as f64)
            } else {
                0
            };
            ModuleBreakdown {
                module,
                label: module.german_label().to_string(),
                raw_score,
                raw_max,
                scaled_score,
                scaled_max: MODULE_TARGET_POINTS,
            }
        })
        .collect();

    SessionSummary {
        total_units,
        answered_units,
        correct_units,
        incorrect_units,
        total_score,
        max_score,
        percentage: percentage_of(total_score, max_score),
        pending_manual_review,
        ai_marked_count,
        automatic_marked_count,
        teil_breakdown,
        module_breakdown,
    }
}
