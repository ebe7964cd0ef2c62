pub mod markers;

pub use markers::{marker_for, ManualMarker, Marker, MultipleChoiceMarker, StatementMatchMarker,
    WrittenResponseMarker};

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::error::{GradingError, GradingResult};
use crate::model::{Question, QuestionResult, Session, SessionSummary, UserAnswer};
use crate::scoring::build_summary;

/// One entry of a bulk answer submission
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub answer: Value,
    pub time_spent_ms: u64,
    pub hints_used: u32,
}

/// Result of finalising a session
#[derive(Debug, Clone)]
pub struct FinalisedSession {
    pub results: Vec<QuestionResult>,
    pub summary: SessionSummary,
}

/// Per-session grading state: id-indexed questions, answers, and results.
///
/// Built from a session, mutated by submissions, and written back with
/// [`QuestionManager::write_back`] before the session is persisted.
pub struct QuestionManager {
    question_order: Vec<String>,
    questions: HashMap<String, Question>,
    answers: HashMap<String, UserAnswer>,
    results: HashMap<String, QuestionResult>,
    last_answered_question_id: Option<String>,
}

impl QuestionManager {
    pub fn from_session(session: &Session) -> Self {
        let question_order = session.questions.iter().map(|q| q.id.clone()).collect();
        let questions = session
            .questions
            .iter()
            .map(|q| (q.id.clone(), q.clone()))
            .collect();
        let answers = session
            .answers
            .iter()
            .map(|a| (a.question_id.clone(), a.clone()))
            .collect();
        let results = session
            .results
            .iter()
            .map(|r| (r.question_id.clone(), r.clone()))
            .collect();

        Self {
            question_order,
            questions,
            answers,
            results,
            last_answered_question_id: session.last_answered_question_id.clone(),
        }
    }

    /// Submit one answer and grade it immediately.
    ///
    /// Resubmission replaces the prior answer and increments `attempts`. A
    /// `null` answer is normalised to an empty string so markers never see
    /// null. Example questions cannot be answered.
    pub async fn submit_answer(
        &mut self,
        question_id: &str,
        answer: Value,
        time_spent_ms: u64,
        hints_used: u32,
    ) -> GradingResult<QuestionResult> {
        let question = self
            .questions
            .get(question_id)
            .ok_or_else(|| GradingError::UnknownQuestion {
                question_id: question_id.to_string(),
            })?
            .clone();

        if question.is_example {
            return Err(GradingError::ExampleQuestion {
                question_id: question_id.to_string(),
            });
        }

        let attempts = self
            .answers
            .get(question_id)
            .map(|a| a.attempts)
            .unwrap_or(0)
            + 1;

        let normalised = if answer.is_null() {
            Value::String(String::new())
        } else {
            answer
        };

        let user_answer = UserAnswer {
            question_id: question_id.to_string(),
            answer: normalised,
            time_spent_ms,
            attempts,
            hints_used,
            timestamp: Utc::now(),
        };

        let marker = marker_for(question.module_id);
        let result = marker.mark(&question, &user_answer).await?;

        debug!(
            question_id,
            attempts,
            score = result.score,
            correct = result.is_correct,
            "Answer marked"
        );

        if let Some(stored) = self.questions.get_mut(question_id) {
            stored.answered = true;
            stored.answer = Some(user_answer.answer.clone());
            stored.last_submitted_at = Some(user_answer.timestamp);
        }

        self.answers.insert(question_id.to_string(), user_answer);
        self.results.insert(question_id.to_string(), result.clone());
        self.last_answered_question_id = Some(question_id.to_string());

        Ok(result)
    }

    /// Submit several answers in order.
    ///
    /// The whole batch is validated up front: any unknown question id or
    /// example question aborts the batch before anything is marked.
    pub async fn submit_answers_bulk(
        &mut self,
        entries: Vec<AnswerSubmission>,
    ) -> GradingResult<Vec<QuestionResult>> {
        for entry in &entries {
            let question = self.questions.get(&entry.question_id).ok_or_else(|| {
                GradingError::UnknownQuestion {
                    question_id: entry.question_id.clone(),
                }
            })?;
            if question.is_example {
                return Err(GradingError::ExampleQuestion {
                    question_id: entry.question_id.clone(),
                });
            }
        }

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = self
                .submit_answer(
                    &entry.question_id,
                    entry.answer,
                    entry.time_spent_ms,
                    entry.hints_used,
                )
                .await?;
            results.push(result);
        }

        Ok(results)
    }

    /// Grade every scorable question and build the session summary.
    ///
    /// Unanswered scorable questions get a synthesised empty answer with zero
    /// attempts, so every scorable question carries exactly one result. The
    /// marking strategy is authoritative: already-answered questions are
    /// regraded unconditionally.
    pub async fn finalise(&mut self) -> GradingResult<FinalisedSession> {
        let scorable_ids: Vec<String> = self
            .question_order
            .iter()
            .filter(|id| {
                self.questions
                    .get(id.as_str())
                    .map(|q| q.is_scorable())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        for id in &scorable_ids {
            if !self.answers.contains_key(id) {
                self.answers.insert(
                    id.clone(),
                    UserAnswer {
                        question_id: id.clone(),
                        answer: Value::String(String::new()),
                        time_spent_ms: 0,
                        attempts: 0,
                        hints_used: 0,
                        timestamp: Utc::now(),
                    },
                );
            }
        }

        let mut results = Vec::with_capacity(scorable_ids.len());
        for id in &scorable_ids {
            let question = self.questions.get(id).cloned().ok_or_else(|| {
                GradingError::UnknownQuestion {
                    question_id: id.clone(),
                }
            })?;
            let answer = self.answers.get(id).cloned().ok_or_else(|| {
                GradingError::UnknownQuestion {
                    question_id: id.clone(),
                }
            })?;

            let marker = marker_for(question.module_id);
            let result = marker.mark(&question, &answer).await?;
            self.results.insert(id.clone(), result.clone());
            results.push(result);
        }

        let questions = self.ordered_questions();
        let summary = build_summary(&questions, &results);

        Ok(FinalisedSession { results, summary })
    }

    /// Write the grading state back onto the session and refresh its
    /// progress counters and question pointers.
    pub fn write_back(&self, session: &mut Session) {
        session.questions = self.ordered_questions();
        session.answers = self
            .question_order
            .iter()
            .filter_map(|id| self.answers.get(id).cloned())
            .collect();
        session.results = self
            .question_order
            .iter()
            .filter_map(|id| self.results.get(id).cloned())
            .collect();
        session.last_answered_question_id = self.last_answered_question_id.clone();

        let scorable: Vec<&Question> = session
            .questions
            .iter()
            .filter(|q| q.is_scorable())
            .collect();
        session.progress.total_questions = scorable.len() as u32;
        session.progress.answered_questions =
            scorable.iter().filter(|q| q.answered).count() as u32;
        session.progress.correct_answers = session
            .results
            .iter()
            .filter(|r| r.is_correct)
            .count() as u32;
        session.progress.score = session.results.iter().map(|r| r.score).sum();
        session.progress.max_score = scorable
            .iter()
            .map(|q| {
                self.results
                    .get(&q.id)
                    .map(|r| r.max_score)
                    .unwrap_or(q.points as f64)
            })
            .sum();

        // Active pointer lands on the lowest-ordered unanswered question
        session.active_question_id = scorable
            .iter()
            .find(|q| !q.answered)
            .map(|q| q.id.clone());

        session.touch();
    }

    fn ordered_questions(&self) -> Vec<Question> {
        self.question_order
            .iter()
            .filter_map(|id| self.questions.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Difficulty, ModuleId, QuestionInputType, SessionModule,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn make_question(id: &str, teil: u32, is_example: bool) -> Question {
        Question {
            id: id.to_string(),
            module_id: ModuleId::MultipleChoice,
            session_module: SessionModule::Reading,
            teil,
            order: 0,
            prompt: "Prompt".to_string(),
            content: Value::Null,
            points: 1,
            is_example,
            answer: None,
            answered: is_example,
            last_submitted_at: None,
            input_type: QuestionInputType::MultipleChoice,
            options: Vec::new(),
            correct_option_id: Some("a".to_string()),
            correct_answer: None,
            statements: Vec::new(),
            correct_matches: None,
            gaps: Vec::new(),
            scoring_rubric: Vec::new(),
        }
    }

    fn make_session(questions: Vec<Question>) -> Session {
        let mut session =
            Session::new("user-1", SessionModule::Reading, Difficulty::Intermediate);
        for question in questions {
            let units = if question.is_example { 0 } else { 1 };
            session.append_question(question, units);
        }
        session
    }

    #[tokio::test]
    async fn test_submit_answer_marks_and_stores() {
        let session = make_session(vec![make_question("q-1", 1, false)]);
        let mut manager = QuestionManager::from_session(&session);

        let result = manager
            .submit_answer("q-1", json!("a"), 500, 0)
            .await
            .unwrap();
        assert!(result.is_correct);
        assert_eq!(result.user_answer.attempts, 1);
    }

    #[tokio::test]
    async fn test_resubmission_increments_attempts() {
        let session = make_session(vec![make_question("q-1", 1, false)]);
        let mut manager = QuestionManager::from_session(&session);

        manager
            .submit_answer("q-1", json!("b"), 500, 0)
            .await
            .unwrap();
        let result = manager
            .submit_answer("q-1", json!("a"), 500, 0)
            .await
            .unwrap();

        assert_eq!(result.user_answer.attempts, 2);
        assert!(result.is_correct);

        let mut session = make_session(vec![make_question("q-1", 1, false)]);
        manager.write_back(&mut session);
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.results.len(), 1);
        assert!(session.results[0].is_correct);
    }

    #[tokio::test]
    async fn test_example_question_rejected() {
        let session = make_session(vec![make_question("q-ex", 1, true)]);
        let mut manager = QuestionManager::from_session(&session);

        let result = manager.submit_answer("q-ex", json!("a"), 0, 0).await;
        assert!(matches!(result, Err(GradingError::ExampleQuestion { .. })));
    }

    #[tokio::test]
    async fn test_unknown_question_rejected() {
        let session = make_session(vec![make_question("q-1", 1, false)]);
        let mut manager = QuestionManager::from_session(&session);

        let result = manager.submit_answer("missing", json!("a"), 0, 0).await;
        assert!(matches!(result, Err(GradingError::UnknownQuestion { .. })));
    }

    #[tokio::test]
    async fn test_null_answer_normalised() {
        let session = make_session(vec![make_question("q-1", 1, false)]);
        let mut manager = QuestionManager::from_session(&session);

        let result = manager
            .submit_answer("q-1", Value::Null, 0, 0)
            .await
            .unwrap();
        assert_eq!(result.user_answer.answer, Value::String(String::new()));
        assert!(!result.is_correct);
    }

    #[tokio::test]
    async fn test_bulk_aborts_on_unknown_id_without_commit() {
        let session = make_session(vec![make_question("q-1", 1, false)]);
        let mut manager = QuestionManager::from_session(&session);

        let entries = vec![
            AnswerSubmission {
                question_id: "q-1".to_string(),
                answer: json!("a"),
                time_spent_ms: 100,
                hints_used: 0,
            },
            AnswerSubmission {
                question_id: "missing".to_string(),
                answer: json!("a"),
                time_spent_ms: 100,
                hints_used: 0,
            },
        ];

        let result = manager.submit_answers_bulk(entries).await;
        assert!(matches!(result, Err(GradingError::UnknownQuestion { .. })));
        // Nothing committed, q-1 is still unanswered
        assert!(manager.answers.is_empty());
        assert!(manager.results.is_empty());
    }

    #[tokio::test]
    async fn test_finalise_synthesises_empty_answers() {
        let session = make_session(vec![
            make_question("q-ex", 1, true),
            make_question("q-1", 1, false),
            make_question("q-2", 1, false),
        ]);
        let mut manager = QuestionManager::from_session(&session);

        manager
            .submit_answer("q-1", json!("a"), 500, 0)
            .await
            .unwrap();

        let finalised = manager.finalise().await.unwrap();
        assert_eq!(finalised.results.len(), 2);

        let unanswered = finalised
            .results
            .iter()
            .find(|r| r.question_id == "q-2")
            .unwrap();
        assert_eq!(unanswered.user_answer.attempts, 0);
        assert!(!unanswered.is_correct);

        assert_eq!(finalised.summary.total_units, 2);
        assert_eq!(finalised.summary.correct_units, 1);
    }

    #[tokio::test]
    async fn test_finalise_empty_session_yields_zero_summary() {
        let session = make_session(vec![make_question("q-ex", 1, true)]);
        let mut manager = QuestionManager::from_session(&session);

        let finalised = manager.finalise().await.unwrap();
        assert!(finalised.results.is_empty());
        assert_eq!(finalised.summary.total_units, 0);
        assert_eq!(finalised.summary.percentage, 0);
    }

    #[tokio::test]
    async fn test_write_back_updates_progress_and_pointer() {
        let questions = vec![
            make_question("q-1", 1, false),
            make_question("q-2", 1, false),
        ];
        let mut session = make_session(questions);
        let mut manager = QuestionManager::from_session(&session);

        manager
            .submit_answer("q-1", json!("a"), 500, 0)
            .await
            .unwrap();
        manager.write_back(&mut session);

        assert_eq!(session.progress.answered_questions, 1);
        assert_eq!(session.progress.correct_answers, 1);
        assert_eq!(session.progress.score, 1.0);
        assert_eq!(session.active_question_id.as_deref(), Some("q-2"));
        assert_eq!(session.last_answered_question_id.as_deref(), Some("q-1"));
    }
}
