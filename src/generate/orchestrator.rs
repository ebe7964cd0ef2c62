use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::teil::{GeneratedTeil, TeilGenerator};
use crate::error::{AppError, AppResult};
use crate::gateway::QuestionGateway;
use crate::model::{Difficulty, GenerationStatus, Session, SessionModule};
use crate::plan::SessionPlan;
use crate::scoring::units_of;
use crate::storage::SessionStore;

/// Outcome of one orchestration run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub status: GenerationStatus,
    pub teils_flushed: u32,
    pub questions_persisted: u32,
    pub units_persisted: u32,
    pub error: Option<String>,
}

/// Everything the flush critical section owns. The session itself lives here
/// for the duration of a run, so no separate session lock is needed.
struct FlushState {
    session: Session,
    buffer: BTreeMap<u32, GeneratedTeil>,
    next_teil: u32,
    teils_flushed: u32,
    questions_persisted: u32,
    units_persisted: u32,
}

struct Shared {
    next_index: AtomicUsize,
    stop: AtomicBool,
    flush: Mutex<FlushState>,
    failure: std::sync::Mutex<Option<AppError>>,
}

/// Drives generation of a whole plan with a bounded worker pool.
///
/// Teils finish in arbitrary order but become durable strictly in plan order:
/// completed Teils wait in a reorder buffer until every lower-numbered Teil
/// has flushed. The first failure stops all further claims and discards any
/// buffered-but-unflushed Teils so readers never see a gap in the sequence.
pub struct Orchestrator {
    generator: TeilGenerator,
    store: Arc<dyn SessionStore>,
    max_workers: usize,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn QuestionGateway>,
        store: Arc<dyn SessionStore>,
        max_workers: usize,
    ) -> Self {
        Self {
            generator: TeilGenerator::new(gateway),
            store,
            max_workers,
        }
    }

    /// Generate every Teil of the plan into the session.
    ///
    /// Returns the updated session and a report. A generation failure is a
    /// normal outcome reported as `GenerationStatus::Failed`; `Err` is
    /// reserved for infrastructure faults (worker panic, final persist).
    pub async fn run(
        &self,
        mut session: Session,
        plan: SessionPlan,
    ) -> AppResult<(Session, GenerationReport)> {
        let teil_count = plan.entries.len();
        let difficulty = session.difficulty;
        let module = plan.module;

        session.generation.begin(plan.total_requested_units());

        if teil_count == 0 {
            session.generation.complete();
            self.store.persist(&mut session).await?;
            return Ok((
                session,
                GenerationReport {
                    status: GenerationStatus::Completed,
                    teils_flushed: 0,
                    questions_persisted: 0,
                    units_persisted: 0,
                    error: None,
                },
            ));
        }

        self.store.persist(&mut session).await?;

        let concurrency = self.max_workers.max(1).min(teil_count);
        info!(
            session_id = %session.id,
            teils = teil_count,
            workers = concurrency,
            "Starting question generation"
        );

        let shared = Arc::new(Shared {
            next_index: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            flush: Mutex::new(FlushState {
                session,
                buffer: BTreeMap::new(),
                next_teil: 1,
                teils_flushed: 0,
                questions_persisted: 0,
                units_persisted: 0,
            }),
            failure: std::sync::Mutex::new(None),
        });
        let plan = Arc::new(plan);

        let mut handles = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            handles.push(tokio::spawn(Self::worker(
                Arc::clone(&shared),
                self.generator.clone(),
                Arc::clone(&self.store),
                Arc::clone(&plan),
                module,
                difficulty,
                worker_id,
            )));
        }

        for handle in handles {
            handle.await.map_err(|e| AppError::Internal {
                message: format!("Generation worker panicked: {}", e),
            })?;
        }

        let shared = Arc::try_unwrap(shared).map_err(|_| AppError::Internal {
            message: "Generation state still shared after workers exited".to_string(),
        })?;
        let failure = shared
            .failure
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let flush = shared.flush.into_inner();
        let mut session = flush.session;

        let (status, error) = match failure {
            Some(err) => {
                let message = err.to_string();
                if !flush.buffer.is_empty() {
                    warn!(
                        session_id = %session.id,
                        discarded = flush.buffer.len(),
                        "Discarding buffered Teils after failure"
                    );
                }
                session.generation.fail(message.clone());
                (GenerationStatus::Failed, Some(message))
            }
            None => {
                session.generation.complete();
                (GenerationStatus::Completed, None)
            }
        };

        self.store.persist(&mut session).await?;

        match status {
            GenerationStatus::Failed => warn!(
                session_id = %session.id,
                teils_flushed = flush.teils_flushed,
                "Question generation failed"
            ),
            _ => info!(
                session_id = %session.id,
                teils_flushed = flush.teils_flushed,
                questions = flush.questions_persisted,
                "Question generation completed"
            ),
        }

        Ok((
            session,
            GenerationReport {
                status,
                teils_flushed: flush.teils_flushed,
                questions_persisted: flush.questions_persisted,
                units_persisted: flush.units_persisted,
                error,
            },
        ))
    }

    async fn worker(
        shared: Arc<Shared>,
        generator: TeilGenerator,
        store: Arc<dyn SessionStore>,
        plan: Arc<SessionPlan>,
        module: SessionModule,
        difficulty: Difficulty,
        worker_id: usize,
    ) {
        loop {
            if shared.stop.load(Ordering::Acquire) {
                break;
            }

            let index = shared.next_index.fetch_add(1, Ordering::SeqCst);
            if index >= plan.entries.len() {
                break;
            }
            let teil = (index + 1) as u32;
            let entry = &plan.entries[index];

            match generator.generate(entry, teil, module, difficulty).await {
                Ok(generated) => {
                    let mut flush = shared.flush.lock().await;
                    // A Teil that finished after the stop signal is discarded
                    if shared.stop.load(Ordering::Acquire) {
                        warn!(worker = worker_id, teil, "Discarding Teil completed after stop");
                        break;
                    }
                    flush.buffer.insert(teil, generated);
                    if let Err(e) = Self::drain(&mut flush, store.as_ref()).await {
                        error!(worker = worker_id, teil, error = %e, "Flush failed");
                        Self::record_failure(&shared, e);
                        break;
                    }
                }
                Err(e) => {
                    error!(worker = worker_id, teil, error = %e, "Teil generation failed");
                    Self::record_failure(&shared, e);
                    break;
                }
            }
        }
    }

    /// Flush every buffered Teil that is next in plan order. Called with the
    /// flush lock held; reorder can cascade across several buffered Teils.
    async fn drain(flush: &mut FlushState, store: &dyn SessionStore) -> AppResult<()> {
        while let Some(generated) = flush.buffer.remove(&flush.next_teil) {
            for usage in &generated.usage {
                debug!(
                    teil = flush.next_teil,
                    model = %usage.model_id,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Generation usage"
                );
            }
            for question in generated.questions {
                let units = if question.is_example {
                    0
                } else {
                    units_of(&question)
                };
                flush.session.append_question(question, units);
                store.persist(&mut flush.session).await?;
                flush.questions_persisted += 1;
                flush.units_persisted += units;
            }
            info!(teil = flush.next_teil, "Teil flushed");
            flush.teils_flushed += 1;
            flush.next_teil += 1;
        }
        Ok(())
    }

    fn record_failure(shared: &Shared, error: AppError) {
        shared.stop.store(true, Ordering::Release);
        let mut failure = shared
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failure.is_none() {
            *failure = Some(error);
        }
    }
}
