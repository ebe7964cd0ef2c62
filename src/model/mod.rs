use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Exam module a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionModule {
    Reading,
    Listening,
    Writing,
    Speaking,
}

impl SessionModule {
    /// Canonical module order used in summaries
    pub const ALL: [SessionModule; 4] = [
        SessionModule::Reading,
        SessionModule::Listening,
        SessionModule::Writing,
        SessionModule::Speaking,
    ];

    /// German display label
    pub fn german_label(&self) -> &'static str {
        match self {
            SessionModule::Reading => "Lesen",
            SessionModule::Listening => "Hören",
            SessionModule::Writing => "Schreiben",
            SessionModule::Speaking => "Sprechen",
        }
    }
}

impl fmt::Display for SessionModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionModule::Reading => "reading",
            SessionModule::Listening => "listening",
            SessionModule::Writing => "writing",
            SessionModule::Speaking => "speaking",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SessionModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reading" => Ok(SessionModule::Reading),
            "listening" => Ok(SessionModule::Listening),
            "writing" => Ok(SessionModule::Writing),
            "speaking" => Ok(SessionModule::Speaking),
            _ => Err(format!("Unknown session module: {}", s)),
        }
    }
}

/// Kind of question module used to generate and mark a Teil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    MultipleChoice,
    StatementMatch,
    WrittenResponse,
    SpokenResponse,
}

impl ModuleId {
    /// Input widget the learner answers this kind of question with
    pub fn input_type(&self) -> QuestionInputType {
        match self {
            ModuleId::MultipleChoice => QuestionInputType::MultipleChoice,
            ModuleId::StatementMatch => QuestionInputType::Matching,
            ModuleId::WrittenResponse => QuestionInputType::LongText,
            ModuleId::SpokenResponse => QuestionInputType::AudioRecording,
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleId::MultipleChoice => "multiple_choice",
            ModuleId::StatementMatch => "statement_match",
            ModuleId::WrittenResponse => "written_response",
            ModuleId::SpokenResponse => "spoken_response",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ModuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiple_choice" => Ok(ModuleId::MultipleChoice),
            "statement_match" => Ok(ModuleId::StatementMatch),
            "written_response" => Ok(ModuleId::WrittenResponse),
            "spoken_response" => Ok(ModuleId::SpokenResponse),
            _ => Err(format!("Unknown question module: {}", s)),
        }
    }
}

/// Difficulty level requested for generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        write!(f, "{}", s)
    }
}

/// Who produced a question result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkedBy {
    Manual,
    Ai,
    Automatic,
}

/// Input widget kind, derived from the question module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionInputType {
    MultipleChoice,
    Matching,
    ShortText,
    LongText,
    AudioRecording,
}

/// Lifecycle of question generation for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Progress of question generation, persisted with the session for polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    pub status: GenerationStatus,
    pub total_units: u32,
    pub generated_units: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_teil: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_generated_question_id: Option<String>,
}

impl GenerationState {
    pub fn new() -> Self {
        Self {
            status: GenerationStatus::Pending,
            total_units: 0,
            generated_units: 0,
            current_teil: None,
            started_at: None,
            completed_at: None,
            error: None,
            last_generated_question_id: None,
        }
    }

    /// Transition to in-progress with the estimated unit total
    pub fn begin(&mut self, total_units: u32) {
        self.status = GenerationStatus::InProgress;
        self.total_units = total_units;
        self.generated_units = 0;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
        self.error = None;
    }

    pub fn complete(&mut self) {
        self.status = GenerationStatus::Completed;
        self.current_teil = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = GenerationStatus::Failed;
        self.current_teil = None;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }
}

impl Default for GenerationState {
    fn default() -> Self {
        Self::new()
    }
}

/// One selectable option of a multiple-choice question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// One statement of a statement-match group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub id: String,
    pub text: String,
}

/// One gap of a gap-text question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapItem {
    pub id: String,
    pub solution: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// One criterion of a free-response scoring rubric
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub name: String,
    pub max_points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A generated question as stored on the session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub module_id: ModuleId,
    pub session_module: SessionModule,
    pub teil: u32,
    pub order: u32,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    pub points: u32,
    pub is_example: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    pub answered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_submitted_at: Option<DateTime<Utc>>,
    pub input_type: QuestionInputType,
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

impl Question {
    /// Example questions are worked demonstrations and never graded
    pub fn is_scorable(&self) -> bool {
        !self.is_example
    }
}

/// A learner's answer to one question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_id: String,
    pub answer: Value,
    pub time_spent_ms: u64,
    pub attempts: u32,
    pub hints_used: u32,
    pub timestamp: DateTime<Utc>,
}

/// The marked outcome for one answered question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub question: Question,
    pub user_answer: UserAnswer,
    pub score: f64,
    pub max_score: f64,
    pub is_correct: bool,
    pub feedback: String,
    pub marked_by: MarkedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Value>,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
}

/// Running counters mirrored onto the session after each grading pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub total_questions: u32,
    pub answered_questions: u32,
    pub correct_answers: u32,
    pub score: f64,
    pub max_score: f64,
}

/// Per-Teil score line of a session summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeilBreakdown {
    pub teil: u32,
    pub units: u32,
    pub correct_units: u32,
    pub score: f64,
    pub max_score: f64,
    pub percentage: u32,
}

/// Per-module score line of a session summary, rescaled to the module target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleBreakdown {
    pub module: SessionModule,
    pub label: String,
    pub raw_score: f64,
    pub raw_max: f64,
    pub scaled_score: u32,
    pub scaled_max: u32,
}

/// Frozen grading summary produced when a session completes.
///
/// Counters are scoring units, not stored questions. A statement-match
/// question with five statements contributes five units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_units: u32,
    pub answered_units: u32,
    pub correct_units: u32,
    pub incorrect_units: u32,
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: u32,
    pub pending_manual_review: u32,
    pub ai_marked_count: u32,
    pub automatic_marked_count: u32,
    pub teil_breakdown: Vec<TeilBreakdown>,
    pub module_breakdown: Vec<ModuleBreakdown>,
}

/// A learner's exam session with its generated questions, answers, and results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub module: SessionModule,
    pub status: SessionStatus,
    pub difficulty: Difficulty,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    pub generation: GenerationState,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<UserAnswer>,
    #[serde(default)]
    pub results: Vec<QuestionResult>,
    #[serde(default)]
    pub progress: SessionProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_answered_question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
    pub version: u64,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl Session {
    pub fn new(user_id: &str, module: SessionModule, difficulty: Difficulty) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            module,
            status: SessionStatus::Active,
            difficulty,
            started_at: now,
            ended_at: None,
            duration_secs: None,
            generation: GenerationState::new(),
            questions: Vec::new(),
            answers: Vec::new(),
            results: Vec::new(),
            progress: SessionProgress::default(),
            active_question_id: None,
            last_answered_question_id: None,
            summary: None,
            version: 0,
            last_updated_at: now,
            metadata: Value::Null,
        }
    }

    /// Refresh the last-updated timestamp
    pub fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }

    /// Append one generated question and update the generation bookkeeping.
    ///
    /// `units` is the question's scoring-unit weight (0 for examples).
    pub fn append_question(&mut self, question: Question, units: u32) {
        self.generation.generated_units += units;
        // Composite questions can expand past the requested-count estimate;
        // widen the total so progress never reads above 100%
        if self.generation.generated_units > self.generation.total_units {
            self.generation.total_units = self.generation.generated_units;
        }
        self.generation.current_teil = Some(question.teil);
        self.generation.last_generated_question_id = Some(question.id.clone());

        if question.is_scorable() {
            self.progress.total_questions += 1;
            self.progress.max_score += question.points as f64;
            if self.active_question_id.is_none() {
                self.active_question_id = Some(question.id.clone());
            }
        }

        self.questions.push(question);
        self.touch();
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_question(id: &str, teil: u32, points: u32, is_example: bool) -> Question {
        Question {
            id: id.to_string(),
            module_id: ModuleId::MultipleChoice,
            session_module: SessionModule::Reading,
            teil,
            order: 1,
            prompt: "Which option fits?".to_string(),
            content: Value::Null,
            points,
            is_example,
            answer: None,
            answered: is_example,
            last_submitted_at: None,
            input_type: QuestionInputType::MultipleChoice,
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
    fn test_module_roundtrip() {
        for module in SessionModule::ALL {
            let parsed: SessionModule = module.to_string().parse().unwrap();
            assert_eq!(parsed, module);
        }
        assert!("translation".parse::<SessionModule>().is_err());
    }

    #[test]
    fn test_module_id_input_type() {
        assert_eq!(
            ModuleId::MultipleChoice.input_type(),
            QuestionInputType::MultipleChoice
        );
        assert_eq!(ModuleId::StatementMatch.input_type(), QuestionInputType::Matching);
        assert_eq!(ModuleId::WrittenResponse.input_type(), QuestionInputType::LongText);
        assert_eq!(
            ModuleId::SpokenResponse.input_type(),
            QuestionInputType::AudioRecording
        );
    }

    #[test]
    fn test_german_labels() {
        assert_eq!(SessionModule::Reading.german_label(), "Lesen");
        assert_eq!(SessionModule::Listening.german_label(), "Hören");
        assert_eq!(SessionModule::Writing.german_label(), "Schreiben");
        assert_eq!(SessionModule::Speaking.german_label(), "Sprechen");
    }

    #[test]
    fn test_append_question_updates_bookkeeping() {
        let mut session = Session::new("user-1", SessionModule::Reading, Difficulty::Intermediate);
        session.generation.begin(3);

        session.append_question(make_question("q-ex", 1, 0, true), 0);
        assert_eq!(session.generation.generated_units, 0);
        assert_eq!(session.progress.total_questions, 0);
        assert_eq!(session.active_question_id, None);

        session.append_question(make_question("q-1", 1, 2, false), 1);
        assert_eq!(session.generation.generated_units, 1);
        assert_eq!(session.generation.total_units, 3);
        assert_eq!(session.progress.total_questions, 1);
        assert_eq!(session.progress.max_score, 2.0);
        assert_eq!(session.active_question_id.as_deref(), Some("q-1"));
        assert_eq!(
            session.generation.last_generated_question_id.as_deref(),
            Some("q-1")
        );
        assert_eq!(session.generation.current_teil, Some(1));
    }

    #[test]
    fn test_append_question_widens_unit_estimate() {
        let mut session = Session::new("user-1", SessionModule::Reading, Difficulty::Beginner);
        session.generation.begin(1);

        // One statement-match question carrying five units
        session.append_question(make_question("q-1", 1, 5, false), 5);
        assert_eq!(session.generation.generated_units, 5);
        assert_eq!(session.generation.total_units, 5);
    }

    #[test]
    fn test_generation_state_transitions() {
        let mut state = GenerationState::new();
        assert_eq!(state.status, GenerationStatus::Pending);

        state.begin(10);
        assert_eq!(state.status, GenerationStatus::InProgress);
        assert!(state.started_at.is_some());

        state.fail("Teil 2 failed".to_string());
        assert_eq!(state.status, GenerationStatus::Failed);
        assert_eq!(state.current_teil, None);
        assert_eq!(state.error.as_deref(), Some("Teil 2 failed"));
    }

    #[test]
    fn test_session_serde_roundtrip() {
        let mut session = Session::new("user-1", SessionModule::Listening, Difficulty::Beginner);
        session.append_question(make_question("q-1", 1, 1, false), 1);

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, session.id);
        assert_eq!(restored.questions.len(), 1);
        assert_eq!(restored.module, SessionModule::Listening);
    }
}
