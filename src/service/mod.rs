use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::gateway::QuestionGateway;
use crate::generate::{GenerationReport, Orchestrator};
use crate::grading::{AnswerSubmission, QuestionManager};
use crate::model::{
    Difficulty, GenerationStatus, QuestionResult, Session, SessionModule, SessionStatus,
};
use crate::plan::SessionPlan;
use crate::storage::SessionStore;

/// High-level session API: create, generate, answer, complete, end.
///
/// All mutation flows through the store's read-modify-write cycle so a stale
/// in-process copy can never clobber a newer persisted session.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    orchestrator: Orchestrator,
}

impl SessionService {
    pub fn new(
        gateway: Arc<dyn QuestionGateway>,
        store: Arc<dyn SessionStore>,
        max_workers: usize,
    ) -> Self {
        let orchestrator = Orchestrator::new(gateway, Arc::clone(&store), max_workers);
        Self {
            store,
            orchestrator,
        }
    }

    pub async fn create_session(
        &self,
        user_id: &str,
        module: SessionModule,
        difficulty: Difficulty,
    ) -> AppResult<Session> {
        let mut session = Session::new(user_id, module, difficulty);
        self.store.create(&mut session).await?;
        info!(session_id = %session.id, module = %module, "Session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str, user_id: &str) -> AppResult<Session> {
        Ok(self.store.load(session_id, user_id).await?)
    }

    /// Generate all questions for the session, using the module's builtin
    /// plan unless the caller supplies one.
    pub async fn generate_questions(
        &self,
        session_id: &str,
        user_id: &str,
        plan: Option<SessionPlan>,
    ) -> AppResult<(Session, GenerationReport)> {
        let session = self.store.load(session_id, user_id).await?;

        match session.generation.status {
            GenerationStatus::InProgress => {
                return Err(AppError::Generation {
                    message: format!("Generation already in progress for session {}", session_id),
                });
            }
            GenerationStatus::Completed => {
                return Err(AppError::Generation {
                    message: format!("Session {} already has generated questions", session_id),
                });
            }
            GenerationStatus::Pending | GenerationStatus::Failed => {}
        }

        let plan = plan.unwrap_or_else(|| SessionPlan::builtin(session.module));
        if plan.module != session.module {
            return Err(AppError::Generation {
                message: format!(
                    "Plan is for module {} but session {} is {}",
                    plan.module, session_id, session.module
                ),
            });
        }

        self.orchestrator.run(session, plan).await
    }

    pub async fn submit_answer(
        &self,
        session_id: &str,
        user_id: &str,
        question_id: &str,
        answer: Value,
        time_spent_ms: u64,
        hints_used: u32,
    ) -> AppResult<(Session, QuestionResult)> {
        let mut session = self.store.load(session_id, user_id).await?;

        let mut manager = QuestionManager::from_session(&session);
        let result = manager
            .submit_answer(question_id, answer, time_spent_ms, hints_used)
            .await?;
        manager.write_back(&mut session);

        self.store.persist(&mut session).await?;
        Ok((session, result))
    }

    pub async fn submit_answers_bulk(
        &self,
        session_id: &str,
        user_id: &str,
        entries: Vec<AnswerSubmission>,
    ) -> AppResult<(Session, Vec<QuestionResult>)> {
        let mut session = self.store.load(session_id, user_id).await?;

        let mut manager = QuestionManager::from_session(&session);
        let results = manager.submit_answers_bulk(entries).await?;
        manager.write_back(&mut session);

        self.store.persist(&mut session).await?;
        Ok((session, results))
    }

    /// Finalise grading, freeze the summary, and close the session.
    pub async fn complete_session(&self, session_id: &str, user_id: &str) -> AppResult<Session> {
        let mut session = self.store.load(session_id, user_id).await?;

        if session.status == SessionStatus::Completed {
            warn!(session_id, "Session already completed");
            return Ok(session);
        }

        let mut manager = QuestionManager::from_session(&session);
        let finalised = manager.finalise().await?;
        manager.write_back(&mut session);

        session.progress.score = finalised.summary.total_score;
        session.progress.max_score = finalised.summary.max_score;
        session.progress.correct_answers = finalised.summary.correct_units;
        session.summary = Some(finalised.summary);
        session.status = SessionStatus::Completed;
        let ended = chrono::Utc::now();
        session.duration_secs = Some((ended - session.started_at).num_seconds().max(0) as u64);
        session.ended_at = Some(ended);

        self.store.persist(&mut session).await?;
        info!(
            session_id,
            score = session.progress.score,
            max_score = session.progress.max_score,
            "Session completed"
        );
        Ok(session)
    }

    /// End the session without grading. A completed session keeps its
    /// status; anything else becomes abandoned.
    pub async fn end_session(&self, session_id: &str, user_id: &str) -> AppResult<Session> {
        let mut session = self.store.load(session_id, user_id).await?;

        if session.status != SessionStatus::Completed {
            session.status = SessionStatus::Abandoned;
        }
        if session.ended_at.is_none() {
            let ended = chrono::Utc::now();
            session.duration_secs =
                Some((ended - session.started_at).num_seconds().max(0) as u64);
            session.ended_at = Some(ended);
        }

        self.store.persist(&mut session).await?;
        info!(session_id, status = ?session.status, "Session ended");
        Ok(session)
    }
}
