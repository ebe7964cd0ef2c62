use crate::model::{ModuleId, Question};

/// Scoring-unit weight of one question.
///
/// A statement-match question is one stored question but counts one unit per
/// statement; every other question counts a single unit. Falls back to the
/// point value (or 1) when a statement-match question carries no statements.
pub fn units_of(question: &Question) -> u32 {
    match question.module_id {
        ModuleId::StatementMatch => {
            if !question.statements.is_empty() {
                question.statements.len() as u32
            } else if question.points > 0 {
                question.points
            } else {
                1
            }
        }
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionInputType, SessionModule, Statement};
    use serde_json::Value;

    fn base_question(module_id: ModuleId) -> Question {
        Question {
            id: "q-1".to_string(),
            module_id,
            session_module: SessionModule::Reading,
            teil: 1,
            order: 1,
            prompt: "Prompt".to_string(),
            content: Value::Null,
            points: 1,
            is_example: false,
            answer: None,
            answered: false,
            last_submitted_at: None,
            input_type: module_id.input_type(),
            options: Vec::new(),
            correct_option_id: None,
            correct_answer: None,
            statements: Vec::new(),
            correct_matches: None,
            gaps: Vec::new(),
            scoring_rubric: Vec::new(),
        }
    }

    #[test]
    fn test_statement_match_counts_statements() {
        let mut question = base_question(ModuleId::StatementMatch);
        question.statements = (1..=5)
            .map(|i| Statement {
                id: format!("s-{}", i),
                text: format!("Statement {}", i),
            })
            .collect();
        assert_eq!(units_of(&question), 5);
    }

    #[test]
    fn test_statement_match_falls_back_to_points() {
        let mut question = base_question(ModuleId::StatementMatch);
        question.points = 6;
        assert_eq!(units_of(&question), 6);
    }

    #[test]
    fn test_statement_match_falls_back_to_one() {
        let mut question = base_question(ModuleId::StatementMatch);
        question.points = 0;
        assert_eq!(units_of(&question), 1);
    }

    #[test]
    fn test_other_modules_count_one() {
        assert_eq!(units_of(&base_question(ModuleId::MultipleChoice)), 1);
        assert_eq!(units_of(&base_question(ModuleId::WrittenResponse)), 1);
        assert_eq!(units_of(&base_question(ModuleId::SpokenResponse)), 1);
    }
}
